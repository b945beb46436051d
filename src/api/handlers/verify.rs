//! Code verification endpoint.

use crate::api::handlers::error_response;
use crate::otp::service::{OtpService, VerifyError};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    session_id: String,
    code: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeResponse {
    success: bool,
    auth_token: String,
    subject: String,
    device_id: String,
    verified_at: DateTime<Utc>,
}

/// Map a verification failure to its HTTP status.
const fn status_for(error: VerifyError) -> StatusCode {
    match error {
        VerifyError::UnknownSession => StatusCode::NOT_FOUND,
        VerifyError::Expired => StatusCode::GONE,
        VerifyError::AlreadyUsed => StatusCode::CONFLICT,
        VerifyError::InvalidCode => StatusCode::UNAUTHORIZED,
    }
}

#[utoipa::path(
    post,
    path = "/auth/verify-code",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Code verified, auth token issued", body = VerifyCodeResponse),
        (status = 400, description = "Session ID or code missing", body = super::ErrorBody),
        (status = 401, description = "Wrong code; retries permitted until expiry", body = super::ErrorBody),
        (status = 404, description = "Unknown session", body = super::ErrorBody),
        (status = 409, description = "Code already used", body = super::ErrorBody),
        (status = 410, description = "Code expired", body = super::ErrorBody)
    ),
    tag = "auth",
)]
#[instrument(skip(service, payload))]
pub async fn verify_code(
    Extension(service): Extension<Arc<OtpService>>,
    payload: Option<Json<VerifyCodeRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Session ID and code are required");
    };

    if request.session_id.is_empty() || request.code.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Session ID and code are required");
    }

    match service.verify(&request.session_id, &request.code).await {
        Ok(verification) => (
            StatusCode::OK,
            Json(VerifyCodeResponse {
                success: true,
                auth_token: verification.auth_token,
                subject: verification.subject,
                device_id: verification.device_id,
                verified_at: verification.verified_at,
            }),
        )
            .into_response(),
        Err(error) => error_response(status_for(error), error.message()),
    }
}

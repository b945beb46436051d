//! Code issuance endpoint.

use crate::api::handlers::error_response;
use crate::otp::service::OtpService;
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
pub struct GenerateCodeRequest {
    /// Opaque caller identity, e.g. a phone number. Required, not
    /// validated for format.
    subject: String,
    device_id: Option<String>,
    /// When set and still valid, the existing session is replayed
    /// unchanged instead of minting a new code.
    existing_session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeResponse {
    success: bool,
    session_id: String,
    /// Returned in the body for demo purposes; a real deployment would
    /// deliver it out of band.
    code: String,
    expires_at: DateTime<Utc>,
}

#[utoipa::path(
    post,
    path = "/auth/generate-code",
    request_body = GenerateCodeRequest,
    responses(
        (status = 200, description = "Code issued or existing session replayed", body = GenerateCodeResponse),
        (status = 400, description = "Subject missing or empty", body = super::ErrorBody)
    ),
    tag = "auth",
)]
#[instrument(skip(service, payload))]
pub async fn generate_code(
    Extension(service): Extension<Arc<OtpService>>,
    payload: Option<Json<GenerateCodeRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Subject is required");
    };

    let subject = request.subject.trim();
    if subject.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Subject is required");
    }

    let issued = service
        .issue(
            subject,
            request.device_id.as_deref(),
            request.existing_session_id.as_deref(),
        )
        .await;

    (
        StatusCode::OK,
        Json(GenerateCodeResponse {
            success: true,
            session_id: issued.session_id,
            code: issued.code,
            expires_at: issued.expires_at,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::{broadcast::Broadcaster, service::OtpConfig};
    use axum::body::to_bytes;

    fn service() -> Arc<OtpService> {
        let broadcaster = Arc::new(Broadcaster::new(std::time::Duration::from_secs(3600)));
        Arc::new(OtpService::new(OtpConfig::new(), broadcaster))
    }

    #[tokio::test]
    async fn missing_payload_is_bad_request() {
        let response = generate_code(Extension(service()), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blank_subject_is_bad_request() -> anyhow::Result<()> {
        let request = GenerateCodeRequest {
            subject: "   ".to_string(),
            device_id: None,
            existing_session_id: None,
        };
        let response = generate_code(Extension(service()), Some(Json(request))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Subject is required");
        Ok(())
    }

    #[tokio::test]
    async fn valid_subject_returns_code_triple() -> anyhow::Result<()> {
        let request = GenerateCodeRequest {
            subject: "+61 400 000 000".to_string(),
            device_id: Some("device-9".to_string()),
            existing_session_id: None,
        };
        let response = generate_code(Extension(service()), Some(Json(request))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(value["success"], true);
        assert!(value["sessionId"].as_str().is_some_and(|s| !s.is_empty()));
        assert!(value["code"]
            .as_str()
            .is_some_and(|c| c.len() == 4 && c.chars().all(|ch| ch.is_ascii_digit())));
        assert!(value["expiresAt"].is_string());
        Ok(())
    }
}

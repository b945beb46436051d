pub mod generate;
pub mod health;
pub mod notifications;
pub mod root;
pub mod sessions;
pub mod verify;

// common response shapes for the handlers
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

/// Error envelope shared by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    #[must_use]
    pub fn new(error: &str) -> Self {
        Self {
            success: false,
            error: error.to_string(),
        }
    }
}

pub(crate) fn error_response(status: StatusCode, error: &str) -> axum::response::Response {
    (status, Json(ErrorBody::new(error))).into_response()
}

//! Service banner.

use axum::response::{IntoResponse, Json};
use serde_json::json;

// axum handler for the root endpoint; undocumented on purpose
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "endpoints": {
            "health": "GET /health",
            "generateCode": "POST /auth/generate-code",
            "verifyCode": "POST /auth/verify-code",
            "adminSessions": "GET /admin/sessions",
            "notifications": "GET /notifications/codes (SSE)"
        }
    }))
}

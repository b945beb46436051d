//! Health endpoint for codice.

use crate::api::ServerStart;
use crate::otp::{broadcast::Broadcaster, service::OtpService};
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    status: String,
    name: String,
    version: String,
    uptime_seconds: u64,
    active_sessions: usize,
    connected_clients: usize,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = Health)
    ),
    tag = "health",
)]
pub async fn health(
    Extension(service): Extension<Arc<OtpService>>,
    Extension(broadcaster): Extension<Arc<Broadcaster>>,
    Extension(started): Extension<ServerStart>,
) -> impl IntoResponse {
    let health = Health {
        status: "healthy".to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: started.0.elapsed().as_secs(),
        active_sessions: service.store().len().await,
        connected_clients: broadcaster.subscriber_count(),
    };

    let headers = format!("{}:{}", health.name, health.version)
        .parse::<HeaderValue>()
        .map(|x_app| {
            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new());

    (headers, Json(health))
}

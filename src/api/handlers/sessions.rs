//! Debug listing of active sessions.
//!
//! Deliberately exposes raw code values: this is a demo-only inspection
//! surface, not something to reproduce behind real traffic.

use crate::otp::{broadcast::Broadcaster, service::OtpService};
use axum::{extract::Extension, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    session_id: String,
    subject: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used: bool,
    code: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionsResponse {
    success: bool,
    active_sessions: Vec<ActiveSession>,
    count: usize,
    connected_clients: usize,
}

#[utoipa::path(
    get,
    path = "/admin/sessions",
    responses(
        (status = 200, description = "All unexpired sessions, codes included", body = SessionsResponse)
    ),
    tag = "admin",
)]
#[instrument(skip(service, broadcaster))]
pub async fn sessions(
    Extension(service): Extension<Arc<OtpService>>,
    Extension(broadcaster): Extension<Arc<Broadcaster>>,
) -> impl IntoResponse {
    let now = Utc::now();
    let mut active: Vec<ActiveSession> = service
        .store()
        .list()
        .await
        .into_iter()
        .filter(|record| !record.is_expired(now))
        .map(|record| ActiveSession {
            session_id: record.session_id,
            subject: record.subject,
            issued_at: record.issued_at,
            expires_at: record.expires_at,
            used: record.used,
            code: record.code,
        })
        .collect();
    active.sort_by(|a, b| a.issued_at.cmp(&b.issued_at));

    let count = active.len();
    Json(SessionsResponse {
        success: true,
        active_sessions: active,
        count,
        connected_clients: broadcaster.subscriber_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::service::OtpConfig;
    use axum::{body::to_bytes, response::IntoResponse};

    #[tokio::test]
    async fn listing_excludes_expired_sessions() -> anyhow::Result<()> {
        let broadcaster = Arc::new(Broadcaster::new(std::time::Duration::from_secs(3600)));
        let service = Arc::new(OtpService::new(
            OtpConfig::new().with_code_ttl(chrono::Duration::milliseconds(20)),
            broadcaster.clone(),
        ));

        let expired = service.issue("old", None, None).await;
        tokio::time::sleep(std::time::Duration::from_millis(40)).await;

        // short TTL applies to this one too; list before it expires
        let live = service.issue("new", None, None).await;
        let response = sessions(Extension(service.clone()), Extension(broadcaster.clone()))
            .await
            .into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;

        let listed: Vec<&str> = value["activeSessions"]
            .as_array()
            .map(|sessions| {
                sessions
                    .iter()
                    .filter_map(|s| s["sessionId"].as_str())
                    .collect()
            })
            .unwrap_or_default();
        assert!(listed.contains(&live.session_id.as_str()));
        assert!(!listed.contains(&expired.session_id.as_str()));
        assert_eq!(value["count"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn listing_reports_subscriber_count() -> anyhow::Result<()> {
        let broadcaster = Arc::new(Broadcaster::new(std::time::Duration::from_secs(3600)));
        let service = Arc::new(OtpService::new(OtpConfig::new(), broadcaster.clone()));
        let _subscription = broadcaster.subscribe();

        let response = sessions(Extension(service), Extension(broadcaster))
            .await
            .into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(value["connectedClients"], 1);
        assert_eq!(value["success"], true);
        Ok(())
    }
}

//! Live code notification stream (Server-Sent Events).

use crate::otp::broadcast::Broadcaster;
use axum::{
    extract::Extension,
    response::sse::{Event, Sse},
};
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use tracing::instrument;

/// Long-lived SSE stream of code events.
///
/// Each message is a JSON envelope `{type, data?, timestamp}` where type is
/// `CONNECTED` (sent once on subscribe), `NEW_CODE`, or `PING` (every 30s).
/// Subscribers only see events published after they connect.
#[utoipa::path(
    get,
    path = "/notifications/codes",
    responses(
        (status = 200, description = "SSE stream of code event envelopes", content_type = "text/event-stream")
    ),
    tag = "notifications",
)]
#[instrument(skip(broadcaster))]
pub async fn notifications(
    Extension(broadcaster): Extension<Arc<Broadcaster>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = broadcaster
        .subscribe()
        .map(|envelope| Event::default().json_data(&envelope));

    Sse::new(stream)
}

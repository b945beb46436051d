use crate::otp::{
    broadcast::{Broadcaster, PING_INTERVAL},
    service::{OtpConfig, OtpService},
    sweeper::{Sweeper, SWEEP_INTERVAL},
};
use anyhow::Result;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderName, HeaderValue, Method, Request},
    routing::get,
    Router,
};
use std::{sync::Arc, time::Instant};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Process start instant, used by the health endpoint for uptime.
#[derive(Clone, Copy, Debug)]
pub struct ServerStart(pub Instant);

/// Build the application router with middleware and shared state attached.
#[must_use]
pub fn router(
    service: Arc<OtpService>,
    broadcaster: Arc<Broadcaster>,
    started: ServerStart,
) -> Router {
    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        // allow requests from any origin
        .allow_origin(Any)
        .allow_headers(Any);

    let (router, _openapi) = openapi::api_router().split_for_parts();

    router
        .route("/", get(handlers::root::root))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(service))
                .layer(Extension(broadcaster))
                .layer(Extension(started)),
        )
}

/// Start the server.
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn new(port: u16) -> Result<()> {
    let broadcaster = Arc::new(Broadcaster::new(PING_INTERVAL));
    let service = Arc::new(OtpService::new(OtpConfig::new(), broadcaster.clone()));

    // Owned by this scope; dropped (and aborted) when the server stops.
    let _sweeper = Sweeper::spawn(service.store(), SWEEP_INTERVAL);

    let app = router(service, broadcaster, ServerStart(Instant::now()));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Gracefully shutdown");
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, request_id)
}

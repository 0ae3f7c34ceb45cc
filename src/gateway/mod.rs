//! HTTP API over the WhatsApp session.
//!
//! Every `/api/whatsapp/*` route requires the shared secret in the
//! `x-api-key` header. Errors are returned as `{ "error": "..." }`.

pub mod auth;
pub mod error;
pub mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::heartbeat::daily_report::DailyReport;
use crate::whatsapp::connection::ConnectionManager;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Session owner.
    pub manager: Arc<ConnectionManager>,
    /// Report job for on-demand runs.
    pub report: Arc<DailyReport>,
    /// Shared secret. `None` rejects every authenticated request.
    pub api_key: Option<Arc<str>>,
}

/// Build the router.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/whatsapp/status", get(handlers::status))
        .route("/api/whatsapp/restart", post(handlers::restart))
        .route("/api/whatsapp/send", post(handlers::send))
        .route("/api/whatsapp/report", post(handlers::report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API on `addr` until `shutdown` completes.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(
    addr: SocketAddr,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "gateway listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("gateway server failed")
}

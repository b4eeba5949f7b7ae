//! Axum HTTP server for the kiosk API and screens.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json,
    Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::state::GatewayState;
use crate::{dialogue, stt, tts};

/// Largest accepted request body. Recorded WAV clips dominate this.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

const PRUNE_EVERY: Duration = Duration::from_secs(60);

/// Build the full application router.
///
/// API routes are registered first so they take priority over the
/// `/{page}` capture of the screen router.
pub fn router(state: Arc<GatewayState>) -> Router {
    let pages = state.config.server.pages;

    let mut app = Router::new()
        .route("/stt", post(stt::transcribe))
        .route("/tts", post(tts::synthesize))
        .route("/send-message", post(dialogue::send_message))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state);

    if pages {
        app = app.merge(kiosk_web::pages_router());
    }

    app.layer(TraceLayer::new_for_http())
}

/// Serve the gateway on `addr` until Ctrl+C.
pub async fn start_gateway(state: Arc<GatewayState>, addr: &str) -> anyhow::Result<()> {
    let max_idle = Duration::from_secs(state.config.dialogue.session_idle_secs);
    let pruner = state.sessions.spawn_pruner(PRUNE_EVERY, max_idle);

    if state.config.server.pages {
        info!("Kiosk screens available at http://{addr}/mainpage");
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pruner.abort();
    Ok(())
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "status": "ok",
        "version": version,
        "sessions": state.sessions.len(),
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

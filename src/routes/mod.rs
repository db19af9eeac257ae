pub mod monitor;
pub mod webhook;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{auth::require_api_key, state::SharedState};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/",             get(monitor::root))
        // ── Signals ───────────────────────────────────────────────────────────
        .route("/webhook",      post(webhook::handle_webhook))
        // ── Operator ──────────────────────────────────────────────────────────
        .route("/api/health",   get(monitor::health))
        .route("/api/position", get(monitor::get_position))
        .route("/api/resync",   post(monitor::resync))
        // ── Middleware ────────────────────────────────────────────────────────
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

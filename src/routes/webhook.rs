//! # routes::webhook
//!
//! **Signal entry point** — TradingView alert → secret check → state machine
//!
//! ```text
//! POST /webhook
//! { "secret": "...", "ticker": "BTCUSDT.P", "event": "VECTOR",
//!   "color": "green", "timeframe": "15", "bar_time": "1700000000000", "low": 50000 }
//! ```
//!
//! Authorised alerts always get `200` with a status string, whatever the
//! broker did.  Only a bad secret is a distinct `403`.

use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    auth::verify_secret,
    engine::SignalStatus,
    error::AppError,
    models::{Signal, WebhookPayload},
    state::SharedState,
};

// ─── POST /webhook ────────────────────────────────────────────────────────────

pub async fn handle_webhook(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload = WebhookPayload::from_body(&body);

    if !verify_secret(&state.config.webhook_secret, payload.secret.as_deref()) {
        return Err(AppError::Forbidden);
    }

    let signal = Signal::from(payload);
    let seq = state.record_signal();
    let span = info_span!("signal", id = %Uuid::new_v4(), seq, symbol = %signal.symbol);

    let outcome = async move {
        info!(event = ?signal.event, color = ?signal.color, action = ?signal.action, "📥 Signal received");

        let outcome = state.dispatcher.handle_signal(signal).await;

        if matches!(
            outcome.status,
            SignalStatus::EnterLong | SignalStatus::EnterShort | SignalStatus::Exit
        ) {
            state.record_order();
        }

        info!(status = outcome.status.as_str(), "📤 Signal handled");
        outcome
    }
    .instrument(span)
    .await;

    Ok(Json(outcome))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

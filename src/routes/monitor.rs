//! # routes::monitor
//!
//! **Operator endpoints**
//!
//! ## Endpoints
//!
//! | Method | Path            | Description                                   |
//! |--------|-----------------|-----------------------------------------------|
//! | GET    | `/`             | liveness text                                 |
//! | GET    | `/api/health`   | counters, broker mode, position flag (no key) |
//! | GET    | `/api/position` | GlobalPosition snapshot                       |
//! | POST   | `/api/resync`   | manual reconciliation `{ "symbol"?: "..." }`  |

use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::Ordering;
use tracing::info;

use crate::{
    engine::SignalStatus,
    error::AppError,
    models::Symbol,
    state::SharedState,
};

/// GET /
pub async fn root() -> &'static str {
    "tvbridge: TradingView → BitMart futures bridge is running"
}

/// GET /api/health
pub async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let snapshot = state.dispatcher.try_snapshot();

    Json(json!({
        "ok":             true,
        "broker_mode":    state.config.broker.mode.as_str(),
        "signal_count":   state.signal_count.load(Ordering::Relaxed),
        "order_count":    state.order_count.load(Ordering::Relaxed),
        // null while a signal is being processed
        "position_open":  snapshot.as_ref().map(|s| s.open),
        "busy":           snapshot.is_none(),
        "allowed_symbols": state.config.allowed_symbols,
        "uptime_secs":    (chrono::Utc::now() - state.started_at).num_seconds(),
    }))
}

/// GET /api/position
pub async fn get_position(State(state): State<SharedState>) -> impl IntoResponse {
    let position = state.dispatcher.snapshot().await;
    Json(json!({
        "ok":       true,
        "position": position,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResyncRequest {
    pub symbol: Option<String>,
}

/// POST /api/resync. Same as a RESET alert, without the webhook secret
pub async fn resync(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request: ResyncRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ResyncRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("invalid resync body: {e}")))?
    };

    let preferred = request
        .symbol
        .as_deref()
        .map(Symbol::normalize)
        .filter(|s| !s.is_empty());

    info!(preferred = ?preferred, "🔄 Manual resync requested");
    let outcome = state.dispatcher.resync(preferred).await;

    Ok(Json(json!({
        "ok":       outcome.status == SignalStatus::Resynced,
        "outcome":  outcome,
        "position": state.dispatcher.snapshot().await,
    })))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::broker::testing::{Call, ScriptedBroker};
    use crate::config::Config;
    use crate::models::Side;
    use crate::routes::router;
    use crate::state::build_state;

    fn app(api_key: Option<&'static str>, broker: Arc<ScriptedBroker>) -> Router {
        let config = Config::from_lookup(move |key: &str| match key {
            "WEBHOOK_SECRET" => Some("hook".into()),
            "API_KEY" => api_key.map(String::from),
            _ => None,
        })
        .unwrap();
        router(build_state(config, broker))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health_is_exempt_from_api_key() {
        let (status, v) = send(
            app(Some("k"), Arc::new(ScriptedBroker::new())),
            Request::get("/api/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["broker_mode"], "paper");
        assert_eq!(v["position_open"], false);
    }

    #[tokio::test]
    async fn test_position_requires_api_key() {
        let broker = Arc::new(ScriptedBroker::new());
        let (status, _) = send(
            app(Some("k"), broker.clone()),
            Request::get("/api/position").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, v) = send(
            app(Some("k"), broker),
            Request::get("/api/position").header("X-API-Key", "k").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["position"]["state"], "FLAT");
    }

    #[tokio::test]
    async fn test_manual_resync_with_preferred_symbol() {
        let broker = Arc::new(ScriptedBroker::new().remote("SOLUSDT", Side::Long));
        let (status, v) = send(
            app(None, broker.clone()),
            Request::post("/api/resync")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"symbol":"solusdt.p"}"#))
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["ok"], true);
        assert_eq!(v["outcome"]["status"], "resynced");
        assert_eq!(v["position"]["symbol"], "SOLUSDT");
        assert_eq!(v["position"]["side"], "LONG");
        assert_eq!(broker.calls(), vec![Call::Query("SOLUSDT".into())]);
    }

    #[tokio::test]
    async fn test_manual_resync_forgets_entry_bar() {
        let config = Config::from_lookup(|key: &str| match key {
            "WEBHOOK_SECRET" => Some("hook".into()),
            _ => None,
        })
        .unwrap();
        let state = build_state(config, Arc::new(ScriptedBroker::new()));
        let alert = r#"{"secret":"hook","event":"VECTOR","color":"green","ticker":"BTCUSDT","bar_time":"1"}"#;

        let (_, v) = send(router(state.clone()), Request::post("/webhook").body(Body::from(alert)).unwrap()).await;
        assert_eq!(v["status"], "enter_long");

        let (status, v) = send(router(state.clone()), Request::post("/api/resync").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["position"]["state"], "FLAT");
        assert_eq!(v["position"]["last_entry_bar_key"], Value::Null);

        let (_, v) = send(router(state), Request::post("/webhook").body(Body::from(alert)).unwrap()).await;
        assert_eq!(v["status"], "enter_long");
    }

    #[tokio::test]
    async fn test_manual_resync_failure_reports_not_ok() {
        let broker = Arc::new(ScriptedBroker::new().unreachable("BTCUSDT"));
        let (status, v) = send(
            app(None, broker),
            Request::post("/api/resync").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["ok"], false);
        assert_eq!(v["outcome"]["status"], "resync_failed");
    }

    #[tokio::test]
    async fn test_root_liveness() {
        let resp = app(Some("k"), Arc::new(ScriptedBroker::new()))
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

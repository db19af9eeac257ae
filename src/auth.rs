//! # auth
//!
//! สองด่าน:
//! - **Webhook secret** — TradingView ส่ง `secret` มาใน body ของ alert
//! - **`X-API-Key`** — ป้องกัน `/api/*` (operator endpoints)
//!
//! ## Mode
//! - `API_KEY` ไม่ได้ตั้ง (หรือ empty) → **Allow All** (Dev Mode)
//! - `API_KEY` ตั้งค่า → ต้องส่ง `X-API-Key: <key>` ทุก Request ที่ไม่ได้ยกเว้น
//!
//! ## ยกเว้น
//! `/`, `/api/health` และ `/webhook` (ใช้ secret ของตัวเองแทน)
//!
//! ## Usage
//! ```bash
//! curl -X POST -H "X-API-Key: super-secret-key-here" http://localhost:3000/api/resync
//! ```

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{error::AppError, state::SharedState};

const EXEMPT_PATHS: &[&str] = &["/", "/api/health", "/webhook"];

/// `true` when the alert carries the configured secret.
pub fn verify_secret(expected: &str, provided: Option<&str>) -> bool {
    match provided {
        Some(p) => !expected.is_empty() && p == expected,
        None => false,
    }
}

/// Axum middleware — ตรวจสอบ X-API-Key header
pub async fn require_api_key(
    State(state): State<SharedState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // ── Dev Mode: ไม่มี API_KEY → ยอมให้ผ่านหมด ─────────────────────────────
    let Some(api_key) = state.config.api_key.as_deref() else {
        return next.run(request).await;
    };

    let path = request.uri().path();
    if EXEMPT_PATHS.contains(&path) {
        return next.run(request).await;
    }

    // ── ตรวจสอบ Header ────────────────────────────────────────────────────────
    let provided = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided == api_key {
        next.run(request).await
    } else {
        warn!(path, "❌ Unauthorized request — invalid or missing X-API-Key");
        AppError::Unauthorized("invalid or missing X-API-Key header".into()).into_response()
    }
}

//! # error
//!
//! Centralised error types.
//!
//! Handlers return `Result<_, AppError>`; the `IntoResponse` impl turns them
//! into structured JSON bodies so TradingView and the operator tools always
//! get a machine-readable answer.  Broker failures never reach this layer:
//! the engine absorbs them into a signal status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// ─── AppError ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    /// Webhook secret missing or wrong.
    #[error("forbidden")]
    Forbidden,

    /// Admin route called without a valid `X-API-Key`.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            // TradingView only looks at the status string
            AppError::Forbidden => (StatusCode::FORBIDDEN, json!({ "status": "forbidden" })),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "ok": false, "error": msg }),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "ok": false, "error": msg }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

// ─── ConfigError ──────────────────────────────────────────────────────────────

/// Startup configuration problems. Fatal: `main` refuses to serve.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key:    String,
        value:  String,
        reason: &'static str,
    },
}

//! # broker
//!
//! Everything that talks to the exchange.
//!
//! * [`Broker`] — the seam the engine depends on.
//! * [`bitmart::BitmartClient`] — signed REST calls against BitMart futures.
//! * [`paper::PaperBroker`] — in-process simulated exchange (`BROKER_MODE=paper`).
//!
//! ## Success contract
//! A call is *confirmed successful* only when the response carries
//! [`SUCCESS_CODE`].  Any other code, a non-JSON body, or a transport fault is
//! a confirmed failure.  Nothing is ever treated as success by default.

pub mod bitmart;
pub mod paper;
pub mod signer;

#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Side, Symbol};

/// BitMart application-level "OK".
pub const SUCCESS_CODE: i64 = 1000;

// ─── BrokerResponse ───────────────────────────────────────────────────────────

/// Body of a broker reply, or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum BrokerPayload {
    Json(Value),
    Text(String),
    /// Network error or timeout; the request may still have executed remotely.
    TransportError(String),
}

/// One outbound call's result. Built per call, inspected, then dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerResponse {
    /// `0` when the request never got an HTTP answer.
    pub http_status: u16,
    pub code:        Option<i64>,
    pub payload:     BrokerPayload,
}

impl BrokerResponse {
    /// Classify a raw HTTP reply body.
    pub fn from_http(http_status: u16, body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(json) => Self {
                http_status,
                code: json.get("code").and_then(Value::as_i64),
                payload: BrokerPayload::Json(json),
            },
            Err(_) => Self {
                http_status,
                code: None,
                payload: BrokerPayload::Text(body.to_string()),
            },
        }
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self {
            http_status: 0,
            code:        None,
            payload:     BrokerPayload::TransportError(message.into()),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.code == Some(SUCCESS_CODE)
    }

    /// `None` on confirmed success, otherwise why it failed.
    pub fn failure(&self) -> Option<BrokerFailure> {
        if self.is_success() {
            return None;
        }
        Some(match (&self.payload, self.code) {
            (BrokerPayload::TransportError(msg), _) => BrokerFailure::Transport(msg.clone()),
            (BrokerPayload::Json(json), Some(code)) => BrokerFailure::Rejected {
                code,
                message: json
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
            },
            (BrokerPayload::Json(_), None) => {
                BrokerFailure::Malformed(format!("HTTP {} without code", self.http_status))
            }
            (BrokerPayload::Text(text), _) => {
                BrokerFailure::Malformed(format!("HTTP {}: {}", self.http_status, truncate(text, 200)))
            }
        })
    }

    /// The `data` field of a JSON reply.
    pub fn data(&self) -> Option<&Value> {
        match &self.payload {
            BrokerPayload::Json(json) => json.get("data"),
            _ => None,
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ─── BrokerFailure ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerFailure {
    /// Network / timeout.  Outcome on the exchange is unknown.
    #[error("transport error: {0}")]
    Transport(String),

    /// Well-formed reply with a non-success code.
    #[error("broker rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },

    /// Reply we could not interpret.
    #[error("malformed broker reply: {0}")]
    Malformed(String),
}

// ─── RemotePositionSnapshot ───────────────────────────────────────────────────

/// The exchange's record for one symbol, as seen by a position query.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePositionSnapshot {
    pub symbol:          Symbol,
    /// `None` when flat.
    pub side:            Option<Side>,
    pub non_zero_amount: bool,
    /// Side came from the amount sign because no position-type field was
    /// present.
    pub side_inferred:   bool,
}

impl RemotePositionSnapshot {
    pub fn flat(symbol: Symbol) -> Self {
        Self {
            symbol,
            side:            None,
            non_zero_amount: false,
            side_inferred:   false,
        }
    }

    /// Open position with a known side.
    pub fn open_side(&self) -> Option<Side> {
        if self.non_zero_amount { self.side } else { None }
    }
}

// ─── Broker ───────────────────────────────────────────────────────────────────

/// Exchange operations the engine needs.  Order calls never return `Err`:
/// transport faults come back as a failed [`BrokerResponse`].
#[async_trait]
pub trait Broker: Send + Sync {
    /// Market order opening `side` on `symbol` with configured size, leverage
    /// and margin mode.
    async fn open_market(&self, symbol: &Symbol, side: Side) -> BrokerResponse;

    /// Reduce-only market order closing a `side` position.
    async fn close_market(&self, symbol: &Symbol, side: Side) -> BrokerResponse;

    /// Position-scoped stop-loss on the closing side of a `side` position,
    /// triggered off last price.
    async fn set_stop_loss(&self, symbol: &Symbol, side: Side, trigger_price: f64) -> BrokerResponse;

    async fn query_position(&self, symbol: &Symbol) -> Result<RemotePositionSnapshot, BrokerFailure>;
}

/// BitMart-style two-decimal price string.
pub fn format_price(price: f64) -> String {
    format!("{price:.2}")
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_only_on_code_1000() {
        let ok = BrokerResponse::from_http(200, r#"{"code":1000,"message":"Ok","data":{}}"#);
        assert!(ok.is_success());
        assert_eq!(ok.failure(), None);

        let rejected = BrokerResponse::from_http(200, r#"{"code":40012,"message":"Insufficient balance"}"#);
        assert!(!rejected.is_success());
        assert_eq!(
            rejected.failure(),
            Some(BrokerFailure::Rejected {
                code:    40012,
                message: "Insufficient balance".into(),
            })
        );
    }

    #[test]
    fn test_http_ok_without_code_is_failure() {
        let resp = BrokerResponse::from_http(200, r#"{"data":[]}"#);
        assert!(matches!(resp.failure(), Some(BrokerFailure::Malformed(_))));

        let html = BrokerResponse::from_http(502, "<html>Bad Gateway</html>");
        assert!(matches!(html.payload, BrokerPayload::Text(_)));
        assert!(matches!(html.failure(), Some(BrokerFailure::Malformed(_))));
    }

    #[test]
    fn test_transport_error_is_synthesized() {
        let resp = BrokerResponse::transport_error("timed out");
        assert_eq!(resp.http_status, 0);
        assert_eq!(resp.failure(), Some(BrokerFailure::Transport("timed out".into())));
    }

    #[test]
    fn test_format_price_two_decimals() {
        assert_eq!(format_price(50000.0), "50000.00");
        assert_eq!(format_price(0.123456), "0.12");
        assert_eq!(format_price(2301.5), "2301.50");
    }
}

//! # broker::bitmart
//!
//! **BitMart Futures V2 client** — ยิง Order จริงไปที่ exchange ผ่าน HTTP
//!
//! | Operation        | Method | Path                                  | Auth   |
//! |------------------|--------|---------------------------------------|--------|
//! | open / close     | POST   | `/contract/private/submit-order`      | SIGNED |
//! | stop-loss        | POST   | `/contract/private/submit-tp-sl-order`| SIGNED |
//! | position query   | GET    | `/contract/private/position`          | KEYED  |
//!
//! Side codes: `1` buy-open-long, `2` buy-close-short, `3` sell-close-long,
//! `4` sell-open-short.  Every reply is `{ "code": 1000, "message": "Ok", "data": ... }`
//! on success.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::broker::signer::{RequestSigner, HEADER_KEY, HEADER_SIGN, HEADER_TIMESTAMP};
use crate::broker::{format_price, Broker, BrokerFailure, BrokerResponse, RemotePositionSnapshot};
use crate::config::{Credentials, TradingConfig};
use crate::models::{Side, Symbol};

pub const SUBMIT_ORDER_PATH: &str = "/contract/private/submit-order";
pub const SUBMIT_TP_SL_PATH: &str = "/contract/private/submit-tp-sl-order";
pub const POSITION_PATH: &str = "/contract/private/position";

/// `price_type` 1 = last traded price.
const PRICE_TYPE_LAST: u8 = 1;
/// `plan_category` 2 = TP/SL attached to the position, not a standalone order.
const PLAN_CATEGORY_POSITION: u8 = 2;

// ─── Side Codes ───────────────────────────────────────────────────────────────

fn open_side_code(side: Side) -> u8 {
    match side {
        Side::Long  => 1, // buy_open_long
        Side::Short => 4, // sell_open_short
    }
}

/// Code that reduces a `side` position.
fn close_side_code(side: Side) -> u8 {
    match side {
        Side::Long  => 3, // sell_close_long
        Side::Short => 2, // buy_close_short
    }
}

// ─── Client ───────────────────────────────────────────────────────────────────

pub struct BitmartClient {
    http:        reqwest::Client,
    base_url:    String,
    credentials: Credentials,
    trading:     TradingConfig,
    timeout:     Duration,
}

impl BitmartClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: Credentials,
        trading: TradingConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credentials,
            trading,
            timeout,
        }
    }

    // ── Bodies ────────────────────────────────────────────────────────────────

    pub fn open_order_body(&self, symbol: &Symbol, side: Side) -> Value {
        json!({
            "symbol":    symbol.as_str(),
            "side":      open_side_code(side),
            "type":      "market",
            "leverage":  self.trading.leverage.to_string(),
            "open_type": self.trading.margin_mode.as_str(),
            "size":      self.trading.size_for(symbol),
        })
    }

    pub fn close_order_body(&self, symbol: &Symbol, side: Side) -> Value {
        json!({
            "symbol": symbol.as_str(),
            "side":   close_side_code(side),
            "type":   "market",
            "size":   self.trading.size_for(symbol),
        })
    }

    pub fn stop_loss_body(&self, symbol: &Symbol, side: Side, trigger_price: f64) -> Value {
        let price = format_price(trigger_price);
        json!({
            "symbol":          symbol.as_str(),
            "type":            "stop_loss",
            "side":            close_side_code(side),
            "trigger_price":   price,
            "executive_price": price,
            "price_type":      PRICE_TYPE_LAST,
            "plan_category":   PLAN_CATEGORY_POSITION,
            "category":        "market",
        })
    }

    // ── Transport ─────────────────────────────────────────────────────────────

    async fn post_signed(&self, path: &str, body: Value) -> BrokerResponse {
        let url = format!("{}{path}", self.base_url);
        let signed = RequestSigner::new(&self.credentials)
            .sign_body(&body, chrono::Utc::now().timestamp_millis());

        info!(url = %url, body = %signed.body, "🚀 [BROKER] POST");

        let result = self
            .http
            .post(&url)
            .header(HEADER_KEY, &self.credentials.api_key)
            .header(HEADER_TIMESTAMP, signed.timestamp_ms.to_string())
            .header(HEADER_SIGN, &signed.signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(signed.body)
            .timeout(self.timeout)
            .send()
            .await;

        read_response(result).await
    }

    async fn get_keyed(&self, path: &str, query: &[(&str, &str)]) -> BrokerResponse {
        let url = format!("{}{path}", self.base_url);

        let result = self
            .http
            .get(&url)
            .query(query)
            .header(HEADER_KEY, &self.credentials.api_key)
            .timeout(self.timeout)
            .send()
            .await;

        read_response(result).await
    }
}

/// Never fails: a transport fault becomes `http_status = 0`.
async fn read_response(result: reqwest::Result<reqwest::Response>) -> BrokerResponse {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "BitMart unreachable");
            return BrokerResponse::transport_error(e.to_string());
        }
    };

    let status = response.status().as_u16();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, http_status = status, "BitMart body read failed");
            return BrokerResponse::transport_error(e.to_string());
        }
    };

    let resp = BrokerResponse::from_http(status, &text);
    match resp.failure() {
        None => info!(http_status = status, code = ?resp.code, "✅ [BROKER] accepted"),
        Some(failure) => warn!(http_status = status, code = ?resp.code, %failure, "[BROKER] not accepted"),
    }
    resp
}

// ─── Position Parsing ─────────────────────────────────────────────────────────

fn as_amount(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Interpret a `/position` reply for `symbol`.
///
/// Open iff some entry reports a non-zero `current_amount`.  Side comes from
/// `position_type` (1 long, 2 short) when present, otherwise from the sign of
/// the amount.  In hedge mode the first non-zero entry wins.
pub fn parse_position(symbol: &Symbol, resp: &BrokerResponse) -> Result<RemotePositionSnapshot, BrokerFailure> {
    if let Some(failure) = resp.failure() {
        return Err(failure);
    }

    let entries: Vec<&Value> = match resp.data() {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(BrokerFailure::Malformed(format!("unexpected position data: {other}")));
        }
    };

    for entry in entries {
        // Some deployments answer with every symbol; skip the others
        if let Some(s) = entry.get("symbol").and_then(Value::as_str) {
            if Symbol::normalize(s) != *symbol {
                continue;
            }
        }

        let amount = as_amount(entry.get("current_amount"))
            .or_else(|| as_amount(entry.get("position_amount")))
            .unwrap_or(0.0);
        if amount == 0.0 {
            continue;
        }

        let declared = match entry.get("position_type").and_then(Value::as_i64) {
            Some(1) => Some(Side::Long),
            Some(2) => Some(Side::Short),
            _ => None,
        };

        let (side, side_inferred) = match declared {
            Some(side) => (side, false),
            None => {
                let side = if amount > 0.0 { Side::Long } else { Side::Short };
                warn!(%symbol, amount, inferred = %side, "No position_type in reply — side inferred from amount sign");
                (side, true)
            }
        };

        return Ok(RemotePositionSnapshot {
            symbol: symbol.clone(),
            side: Some(side),
            non_zero_amount: true,
            side_inferred,
        });
    }

    Ok(RemotePositionSnapshot::flat(symbol.clone()))
}

// ─── Broker impl ──────────────────────────────────────────────────────────────

#[async_trait]
impl Broker for BitmartClient {
    async fn open_market(&self, symbol: &Symbol, side: Side) -> BrokerResponse {
        info!(%symbol, %side, size = self.trading.size_for(symbol), "[BROKER] open market");
        self.post_signed(SUBMIT_ORDER_PATH, self.open_order_body(symbol, side)).await
    }

    async fn close_market(&self, symbol: &Symbol, side: Side) -> BrokerResponse {
        info!(%symbol, %side, "[BROKER] close market");
        self.post_signed(SUBMIT_ORDER_PATH, self.close_order_body(symbol, side)).await
    }

    async fn set_stop_loss(&self, symbol: &Symbol, side: Side, trigger_price: f64) -> BrokerResponse {
        info!(%symbol, %side, trigger_price, "[BROKER] stop-loss");
        self.post_signed(SUBMIT_TP_SL_PATH, self.stop_loss_body(symbol, side, trigger_price)).await
    }

    async fn query_position(&self, symbol: &Symbol) -> Result<RemotePositionSnapshot, BrokerFailure> {
        let resp = self.get_keyed(POSITION_PATH, &[("symbol", symbol.as_str())]).await;
        parse_position(symbol, &resp)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

//! # broker::paper
//!
//! **Paper exchange** — `BROKER_MODE=paper`
//!
//! Keeps a per-symbol position book in memory and answers every call with a
//! BitMart-shaped `code: 1000` reply, so the whole signal → state machine →
//! broker path can run without credentials or network.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::info;

use crate::broker::{
    format_price, Broker, BrokerFailure, BrokerPayload, BrokerResponse, RemotePositionSnapshot, SUCCESS_CODE,
};
use crate::config::TradingConfig;
use crate::models::{Side, Symbol};

#[derive(Debug, Clone, PartialEq)]
pub struct PaperPosition {
    pub side:      Side,
    pub contracts: u64,
    pub stop_loss: Option<String>,
}

#[derive(Default)]
struct Book {
    positions:  HashMap<Symbol, PaperPosition>,
    next_order: u64,
}

pub struct PaperBroker {
    trading: TradingConfig,
    book:    Mutex<Book>,
}

impl PaperBroker {
    pub fn new(trading: TradingConfig) -> Self {
        Self {
            trading,
            book: Mutex::new(Book {
                positions:  HashMap::new(),
                next_order: 1,
            }),
        }
    }

    #[cfg(test)]
    pub async fn position(&self, symbol: &Symbol) -> Option<PaperPosition> {
        self.book.lock().await.positions.get(symbol).cloned()
    }

    fn ok(order_id: Option<u64>) -> BrokerResponse {
        let data = match order_id {
            Some(id) => json!({ "order_id": id }),
            None => json!({}),
        };
        BrokerResponse {
            http_status: 200,
            code:        Some(SUCCESS_CODE),
            payload:     BrokerPayload::Json(json!({
                "code": SUCCESS_CODE, "message": "Ok", "data": data
            })),
        }
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn open_market(&self, symbol: &Symbol, side: Side) -> BrokerResponse {
        let size = u64::from(self.trading.size_for(symbol));
        let mut book = self.book.lock().await;
        let id = book.next_order;
        book.next_order += 1;

        let entry = book.positions.entry(symbol.clone()).or_insert(PaperPosition {
            side,
            contracts: 0,
            stop_loss: None,
        });
        if entry.side == side {
            entry.contracts += size;
        } else if entry.contracts > size {
            entry.contracts -= size;
        } else {
            // Flipped through zero
            entry.contracts = size - entry.contracts;
            entry.side = side;
            entry.stop_loss = None;
        }
        if entry.contracts == 0 {
            book.positions.remove(symbol);
        }

        info!(%symbol, %side, size, order_id = id, "🎭 [PAPER] filled open");
        Self::ok(Some(id))
    }

    async fn close_market(&self, symbol: &Symbol, side: Side) -> BrokerResponse {
        let size = u64::from(self.trading.size_for(symbol));
        let mut book = self.book.lock().await;
        let id = book.next_order;
        book.next_order += 1;

        // Reduce-only: nothing to reduce is still an accepted no-op
        if let Some(pos) = book.positions.get_mut(symbol) {
            if pos.side == side {
                pos.contracts = pos.contracts.saturating_sub(size);
                if pos.contracts == 0 {
                    book.positions.remove(symbol);
                }
            }
        }

        info!(%symbol, %side, size, order_id = id, "🎭 [PAPER] filled close");
        Self::ok(Some(id))
    }

    async fn set_stop_loss(&self, symbol: &Symbol, side: Side, trigger_price: f64) -> BrokerResponse {
        let mut book = self.book.lock().await;
        match book.positions.get_mut(symbol) {
            Some(pos) if pos.side == side => {
                pos.stop_loss = Some(format_price(trigger_price));
                info!(%symbol, %side, trigger = %format_price(trigger_price), "🎭 [PAPER] stop-loss set");
                Self::ok(None)
            }
            // Position-scoped order with no position to attach to
            _ => BrokerResponse::from_http(
                200,
                &json!({ "code": 40045, "message": "No position to attach TP/SL", "data": {} }).to_string(),
            ),
        }
    }

    async fn query_position(&self, symbol: &Symbol) -> Result<RemotePositionSnapshot, BrokerFailure> {
        let book = self.book.lock().await;
        Ok(match book.positions.get(symbol) {
            Some(pos) if pos.contracts > 0 => RemotePositionSnapshot {
                symbol:          symbol.clone(),
                side:            Some(pos.side),
                non_zero_amount: true,
                side_inferred:   false,
            },
            _ => RemotePositionSnapshot::flat(symbol.clone()),
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

//! # engine::reconciler
//!
//! **Reconciler** — ดึง Position จริงจาก exchange มาเขียนทับ state ในเครื่อง
//!
//! ```text
//! search order = [preferred] ++ (allowed symbols in config order, minus preferred)
//! for symbol in order:
//!     query_position(symbol)
//!     non-zero?  → adopt (symbol, side), stop      // first match wins
//! none found    → FLAT
//! query failed  → abort, local state untouched
//! ```
//!
//! This is the only way back to the truth after a restart or after a broker
//! reply was lost in transit.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::broker::{Broker, BrokerFailure};
use crate::models::{GlobalPosition, Side, Symbol};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("position query for {symbol} failed: {failure}")]
pub struct ResyncError {
    pub symbol:  Symbol,
    pub failure: BrokerFailure,
}

/// What a resync found and did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResyncReport {
    /// Symbols queried, in order.
    pub queried: Vec<Symbol>,
    pub symbol:  Option<Symbol>,
    pub side:    Option<Side>,
    /// Side derived from the amount sign rather than a position-type field.
    pub side_inferred: bool,
}

pub struct Reconciler {
    broker:  Arc<dyn Broker>,
    allowed: Vec<Symbol>,
}

impl Reconciler {
    pub fn new(broker: Arc<dyn Broker>, allowed: Vec<Symbol>) -> Self {
        Self { broker, allowed }
    }

    /// `preferred` first (when it is an allowed symbol), then the rest of the
    /// allow-list in configured order.
    pub fn search_order(&self, preferred: Option<&Symbol>) -> Vec<Symbol> {
        let preferred = preferred.filter(|p| self.allowed.contains(p));
        let mut order = Vec::with_capacity(self.allowed.len());
        if let Some(p) = preferred {
            order.push(p.clone());
        }
        order.extend(self.allowed.iter().filter(|s| Some(*s) != preferred).cloned());
        order
    }

    /// Pull remote truth and overwrite `position` with it.
    pub async fn resync(
        &self,
        position: &mut GlobalPosition,
        preferred: Option<&Symbol>,
    ) -> Result<ResyncReport, ResyncError> {
        let mut queried = Vec::new();

        for symbol in self.search_order(preferred) {
            queried.push(symbol.clone());

            let snapshot = self
                .broker
                .query_position(&symbol)
                .await
                .map_err(|failure| {
                    warn!(%symbol, %failure, "⚠️ [RESYNC] query failed — keeping local state");
                    ResyncError {
                        symbol: symbol.clone(),
                        failure,
                    }
                })?;

            if let Some(side) = snapshot.open_side() {
                if snapshot.side_inferred {
                    warn!(%symbol, %side, "[RESYNC] side inferred from amount sign");
                }
                info!(%symbol, %side, "🔄 [RESYNC] adopted remote position");
                position.adopt(snapshot.symbol.clone(), side);
                return Ok(ResyncReport {
                    queried,
                    symbol: Some(snapshot.symbol),
                    side: Some(side),
                    side_inferred: snapshot.side_inferred,
                });
            }
        }

        info!(queried = queried.len(), "🔄 [RESYNC] no remote position — FLAT");
        position.flatten();
        Ok(ResyncReport {
            queried,
            symbol: None,
            side: None,
            side_inferred: false,
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

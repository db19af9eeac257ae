//! # engine::outcome
//!
//! [`SignalOutcome`]: what happened to one signal.  Serialised as the
//! webhook response body, e.g.
//!
//! ```json
//! { "status": "enter_long", "symbol": "BTCUSDT", "side": "LONG",
//!   "broker": { "http_status": 200, "code": 1000, "payload": { ... } },
//!   "stop_loss": { "trigger_price": "50000.00", "placed": true } }
//! ```

use serde::Serialize;

use crate::broker::BrokerResponse;
use crate::engine::reconciler::ResyncReport;
use crate::models::{Side, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    IgnoredSymbol,
    Resynced,
    ResyncFailed,
    IgnoredOtherSymbol,
    /// Exit asked for while flat, and the exchange agrees there is nothing open.
    IgnoredFlat,
    Exit,
    CloseFailed,
    Holding,
    EnterLong,
    EnterShort,
    EntryFailed,
    IgnoredSameBar,
    Ignored,
}

impl SignalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalStatus::IgnoredSymbol      => "ignored_symbol",
            SignalStatus::Resynced           => "resynced",
            SignalStatus::ResyncFailed       => "resync_failed",
            SignalStatus::IgnoredOtherSymbol => "ignored_other_symbol",
            SignalStatus::IgnoredFlat        => "ignored_flat",
            SignalStatus::Exit               => "exit",
            SignalStatus::CloseFailed        => "close_failed",
            SignalStatus::Holding            => "holding",
            SignalStatus::EnterLong          => "enter_long",
            SignalStatus::EnterShort         => "enter_short",
            SignalStatus::EntryFailed        => "entry_failed",
            SignalStatus::IgnoredSameBar     => "ignored_same_bar",
            SignalStatus::Ignored            => "ignored",
        }
    }

    pub fn entered(side: Side) -> Self {
        match side {
            Side::Long  => SignalStatus::EnterLong,
            Side::Short => SignalStatus::EnterShort,
        }
    }
}

/// Best-effort protective order placed after an entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopLossReport {
    pub trigger_price: String,
    pub placed:        bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:         Option<String>,
    pub broker:        BrokerResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalOutcome {
    pub status: SignalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<Symbol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    /// Last order-call response, for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker: Option<BrokerResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<StopLossReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resync: Option<ResyncReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SignalOutcome {
    pub fn new(status: SignalStatus) -> Self {
        Self {
            status,
            symbol:    None,
            side:      None,
            broker:    None,
            stop_loss: None,
            resync:    None,
            error:     None,
        }
    }

    pub fn symbol(mut self, symbol: &Symbol) -> Self {
        self.symbol = Some(symbol.clone());
        self
    }

    pub fn side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    pub fn broker(mut self, resp: BrokerResponse) -> Self {
        self.broker = Some(resp);
        self
    }

    pub fn stop_loss(mut self, report: Option<StopLossReport>) -> Self {
        self.stop_loss = report;
        self
    }

    pub fn resync(mut self, report: Option<ResyncReport>) -> Self {
        self.resync = report;
        self
    }

    pub fn error(mut self, err: impl ToString) -> Self {
        self.error = Some(err.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        let v = serde_json::to_value(SignalOutcome::new(SignalStatus::IgnoredSameBar)).unwrap();
        assert_eq!(v, serde_json::json!({ "status": "ignored_same_bar" }));
        assert_eq!(
            serde_json::to_value(SignalStatus::IgnoredOtherSymbol).unwrap(),
            SignalStatus::IgnoredOtherSymbol.as_str()
        );
    }
}

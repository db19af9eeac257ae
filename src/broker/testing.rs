//! Scripted broker for engine and route tests.
//!
//! Every call is recorded.  Order calls answer with the code configured for
//! that operation (default `1000`); position queries answer from a fixed
//! per-symbol table, or fail for symbols marked unreachable.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::broker::{Broker, BrokerFailure, BrokerResponse, RemotePositionSnapshot, SUCCESS_CODE};
use crate::models::{Side, Symbol};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Open(Symbol, Side),
    Close(Symbol, Side),
    StopLoss(Symbol, Side, f64),
    Query(Symbol),
}

#[derive(Default)]
struct Script {
    open_code:   Option<i64>,
    open_delay:  Option<Duration>,
    close_code:  Option<i64>,
    stop_code:   Option<i64>,
    remote:      HashMap<Symbol, Side>,
    unreachable: HashSet<Symbol>,
    calls:       Vec<Call>,
}

#[derive(Default)]
pub struct ScriptedBroker {
    script: Mutex<Script>,
}

impl ScriptedBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_code(self, code: i64) -> Self {
        self.script.lock().unwrap().open_code = Some(code);
        self
    }

    /// The open order is recorded immediately but answered only after `delay`.
    pub fn open_delay(self, delay: Duration) -> Self {
        self.script.lock().unwrap().open_delay = Some(delay);
        self
    }

    pub fn close_code(self, code: i64) -> Self {
        self.script.lock().unwrap().close_code = Some(code);
        self
    }

    pub fn stop_code(self, code: i64) -> Self {
        self.script.lock().unwrap().stop_code = Some(code);
        self
    }

    /// The exchange holds `side` on `symbol`.
    pub fn remote(self, symbol: &str, side: Side) -> Self {
        self.script.lock().unwrap().remote.insert(Symbol::from(symbol), side);
        self
    }

    pub fn unreachable(self, symbol: &str) -> Self {
        self.script.lock().unwrap().unreachable.insert(Symbol::from(symbol));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn reply(code: Option<i64>) -> BrokerResponse {
        let code = code.unwrap_or(SUCCESS_CODE);
        BrokerResponse::from_http(200, &json!({ "code": code, "message": "scripted", "data": {} }).to_string())
    }
}

#[async_trait]
impl Broker for ScriptedBroker {
    async fn open_market(&self, symbol: &Symbol, side: Side) -> BrokerResponse {
        let (code, delay) = {
            let mut s = self.script.lock().unwrap();
            s.calls.push(Call::Open(symbol.clone(), side));
            (s.open_code, s.open_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::reply(code)
    }

    async fn close_market(&self, symbol: &Symbol, side: Side) -> BrokerResponse {
        let mut s = self.script.lock().unwrap();
        s.calls.push(Call::Close(symbol.clone(), side));
        Self::reply(s.close_code)
    }

    async fn set_stop_loss(&self, symbol: &Symbol, side: Side, trigger_price: f64) -> BrokerResponse {
        let mut s = self.script.lock().unwrap();
        s.calls.push(Call::StopLoss(symbol.clone(), side, trigger_price));
        Self::reply(s.stop_code)
    }

    async fn query_position(&self, symbol: &Symbol) -> Result<RemotePositionSnapshot, BrokerFailure> {
        let mut s = self.script.lock().unwrap();
        s.calls.push(Call::Query(symbol.clone()));
        if s.unreachable.contains(symbol) {
            return Err(BrokerFailure::Transport("scripted timeout".into()));
        }
        Ok(match s.remote.get(symbol) {
            Some(side) => RemotePositionSnapshot {
                symbol:          symbol.clone(),
                side:            Some(*side),
                non_zero_amount: true,
                side_inferred:   false,
            },
            None => RemotePositionSnapshot::flat(symbol.clone()),
        })
    }
}

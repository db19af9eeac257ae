//! # engine::dispatcher
//!
//! Serialises every state-touching operation behind one async mutex.  Two
//! alerts arriving together are processed strictly one after the other, and
//! the lock is held across the broker round-trip so a second entry can never
//! be evaluated against a state that is about to change.
//!
//! Each operation runs on its own task.  If the caller goes away (the alert
//! sender hangs up, a timeout fires) the task still finishes, so an order that
//! reached the exchange is always recorded locally.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::{error, Instrument};

use crate::broker::Broker;
use crate::engine::machine::PositionMachine;
use crate::engine::outcome::{SignalOutcome, SignalStatus};
use crate::models::{ColorPalette, PositionSnapshot, Signal, Symbol};

pub struct SignalDispatcher {
    machine: Arc<Mutex<PositionMachine>>,
}

impl SignalDispatcher {
    pub fn new(broker: Arc<dyn Broker>, allowed: Vec<Symbol>, palette: ColorPalette) -> Self {
        Self {
            machine: Arc::new(Mutex::new(PositionMachine::new(broker, allowed, palette))),
        }
    }

    pub async fn handle_signal(&self, signal: Signal) -> SignalOutcome {
        let machine = self.machine.clone();
        let task = tokio::spawn(
            async move {
                let mut machine = machine.lock().await;
                let outcome = machine.handle(&signal).await;
                outcome
            }
            .in_current_span(),
        );
        task.await.unwrap_or_else(task_failed)
    }

    /// Operator- or startup-triggered resync.
    pub async fn resync(&self, preferred: Option<Symbol>) -> SignalOutcome {
        let machine = self.machine.clone();
        let task = tokio::spawn(
            async move {
                let mut machine = machine.lock().await;
                let outcome = machine.resync(preferred.as_ref()).await;
                outcome
            }
            .in_current_span(),
        );
        task.await.unwrap_or_else(task_failed)
    }

    /// Waits for any in-flight signal to finish first.
    pub async fn snapshot(&self) -> PositionSnapshot {
        self.machine.lock().await.position().snapshot()
    }

    /// Non-blocking read for `/api/health`; `None` while a signal is in flight.
    pub fn try_snapshot(&self) -> Option<PositionSnapshot> {
        self.machine.try_lock().ok().map(|m| m.position().snapshot())
    }
}

/// The task panicked; the lock was released with whatever state it had reached.
fn task_failed(e: JoinError) -> SignalOutcome {
    error!(error = %e, "❌ Signal task failed — RESET to reconcile");
    SignalOutcome::new(SignalStatus::Ignored).error(e)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

//! # state
//!
//! AppState — ของที่ทุก handler ใช้ร่วมกัน: Config, Signal Dispatcher และ Counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::broker::Broker;
use crate::config::Config;
use crate::engine::SignalDispatcher;

// ─── AppState ─────────────────────────────────────────────────────────────────

/// Top-level shared state injected into every Axum handler.
pub struct AppState {
    pub config: Arc<Config>,

    // ── Position Management ───────────────────────────────────────────────────
    /// เจ้าของ GlobalPosition เพียงคนเดียว (ผ่าน Mutex ภายใน)
    pub dispatcher: SignalDispatcher,

    // ── Metrics ───────────────────────────────────────────────────────────────
    /// Webhook ที่ผ่าน secret check แล้ว
    pub signal_count: AtomicU64,
    /// Signal ที่ได้ผลลัพธ์ enter / exit
    pub order_count:  AtomicU64,
    pub started_at:   DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, broker: Arc<dyn Broker>) -> Self {
        let dispatcher = SignalDispatcher::new(
            broker,
            config.allowed_symbols.clone(),
            config.palette.clone(),
        );

        Self {
            config: Arc::new(config),
            dispatcher,
            signal_count: AtomicU64::new(0),
            order_count:  AtomicU64::new(0),
            started_at:   Utc::now(),
        }
    }

    // ── Helper Methods ────────────────────────────────────────────────────────

    pub fn record_signal(&self) -> u64 {
        self.signal_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_order(&self) {
        self.order_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Convenience type alias
pub type SharedState = Arc<AppState>;

pub fn build_state(config: Config, broker: Arc<dyn Broker>) -> SharedState {
    Arc::new(AppState::new(config, broker))
}

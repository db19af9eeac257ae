//! # engine::machine
//!
//! **Position State Machine** — ตัดสินว่า Signal แต่ละตัวจะ เปิด / ถือ / ปิด
//!
//! ## ลำดับการตรวจสอบ (ทุก Signal)
//! ```text
//! 1. Symbol ไม่อยู่ใน allow-list (และไม่ใช่ RESET)   → ignored_symbol
//! 2. RESET                                           → resync, ล้าง bar key
//! 3. ถือ Position อยู่คนละ Symbol                     → ignored_other_symbol
//! 4. EXIT_* ขณะ FLAT                                 → resync ก่อน แล้วค่อยไปต่อ
//! 5. ถือ Position อยู่
//!    a. EXIT ตรงฝั่ง                                 → close
//!    b. VECTOR สีฝั่งตรงข้าม                          → close
//!    c. อื่นๆ                                         → holding
//! 6. FLAT + VECTOR
//!    a. สีไม่รู้จัก                                   → ignored
//!    b. bar key ซ้ำ                                  → ignored_same_bar
//!    c. open → สำเร็จค่อยเปลี่ยน state
//!    d. มี low/high → วาง stop-loss (best-effort)
//! 7. อื่นๆ                                            → ignored
//! ```
//!
//! State only changes on a confirmed broker success.  A failed close keeps the
//! position (it presumably still exists); a failed open keeps FLAT.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::broker::{format_price, Broker, BrokerFailure};
use crate::engine::outcome::{SignalOutcome, SignalStatus, StopLossReport};
use crate::engine::reconciler::{Reconciler, ResyncReport};
use crate::models::{ColorPalette, GlobalPosition, Side, Signal, SignalEvent, Symbol};

pub struct PositionMachine {
    position:   GlobalPosition,
    broker:     Arc<dyn Broker>,
    reconciler: Reconciler,
    allowed:    Vec<Symbol>,
    palette:    ColorPalette,
}

impl PositionMachine {
    /// Starts optimistically FLAT; corrected lazily by RESET or exit-while-flat.
    pub fn new(broker: Arc<dyn Broker>, allowed: Vec<Symbol>, palette: ColorPalette) -> Self {
        Self {
            position: GlobalPosition::flat(),
            reconciler: Reconciler::new(broker.clone(), allowed.clone()),
            broker,
            allowed,
            palette,
        }
    }

    pub fn position(&self) -> &GlobalPosition {
        &self.position
    }

    fn is_allowed(&self, symbol: &Symbol) -> bool {
        self.allowed.contains(symbol)
    }

    // ─── Resync ───────────────────────────────────────────────────────────────

    /// Overwrite local state with the exchange's and forget the last entry
    /// bar. A failed query leaves the position itself untouched.
    pub async fn resync(&mut self, preferred: Option<&Symbol>) -> SignalOutcome {
        self.position.clear_bar_key();
        match self.reconciler.resync(&mut self.position, preferred).await {
            Ok(report) => {
                let mut outcome = SignalOutcome::new(SignalStatus::Resynced);
                outcome.symbol = report.symbol.clone();
                outcome.side = report.side;
                outcome.resync(Some(report))
            }
            Err(e) => SignalOutcome::new(SignalStatus::ResyncFailed).error(e),
        }
    }

    // ─── Decision Table ───────────────────────────────────────────────────────

    pub async fn handle(&mut self, signal: &Signal) -> SignalOutcome {
        let symbol = &signal.symbol;
        let allowed = self.is_allowed(symbol);

        // ── 1. Symbol gate ────────────────────────────────────────────────────
        if !allowed && signal.event != SignalEvent::Reset {
            debug!(%symbol, "Symbol not allowed — ignored");
            return SignalOutcome::new(SignalStatus::IgnoredSymbol).symbol(symbol);
        }

        // ── 2. RESET ──────────────────────────────────────────────────────────
        if signal.event == SignalEvent::Reset {
            info!(%symbol, "🔄 RESET requested");
            let preferred = if allowed { Some(symbol) } else { None };
            return self.resync(preferred).await;
        }

        // ── 3. Global single-position guard ───────────────────────────────────
        if self.position.is_open_on_other(symbol) {
            debug!(%symbol, open = ?self.position.symbol(), "Position open on another symbol — ignored");
            return SignalOutcome::new(SignalStatus::IgnoredOtherSymbol).symbol(symbol);
        }

        // ── 4. Exit while FLAT: don't trust the FLAT belief ───────────────────
        let mut resync_report: Option<ResyncReport> = None;
        if let Some(action) = signal.action {
            if !self.position.is_open() {
                info!(%symbol, ?action, "Exit received while FLAT — resyncing first");
                match self.reconciler.resync(&mut self.position, Some(symbol)).await {
                    Ok(report) => resync_report = Some(report),
                    Err(e) => {
                        return SignalOutcome::new(SignalStatus::ResyncFailed)
                            .symbol(symbol)
                            .error(e);
                    }
                }

                if !self.position.is_open() {
                    return SignalOutcome::new(SignalStatus::IgnoredFlat)
                        .symbol(symbol)
                        .resync(resync_report);
                }
                if self.position.is_open_on_other(symbol) {
                    return SignalOutcome::new(SignalStatus::IgnoredOtherSymbol)
                        .symbol(symbol)
                        .resync(resync_report);
                }
            }
        }

        // ── 5. Holding ────────────────────────────────────────────────────────
        if let Some(held) = self.position.side().filter(|_| self.position.is_open()) {
            let exit_requested = signal.action.is_some_and(|a| a.closes() == held);
            let opposite_vector = signal.event == SignalEvent::Vector
                && self.color_side(signal) == Some(held.opposite());

            if exit_requested || opposite_vector {
                return self.close(symbol, held).await.resync(resync_report);
            }

            return SignalOutcome::new(SignalStatus::Holding)
                .symbol(symbol)
                .side(held)
                .resync(resync_report);
        }

        // ── 6. Entry ──────────────────────────────────────────────────────────
        if signal.event == SignalEvent::Vector {
            let Some(side) = self.color_side(signal) else {
                debug!(%symbol, color = ?signal.color, "Unrecognised colour — ignored");
                return SignalOutcome::new(SignalStatus::Ignored).symbol(symbol);
            };

            let bar_key = signal.bar_key(side);
            if bar_key.is_some() && bar_key.as_deref() == self.position.last_entry_bar_key() {
                info!(%symbol, %side, bar_key = ?bar_key, "Same bar already entered — ignored");
                return SignalOutcome::new(SignalStatus::IgnoredSameBar).symbol(symbol).side(side);
            }

            return self.enter(signal, side, bar_key).await;
        }

        // ── 7. Nothing matched ────────────────────────────────────────────────
        SignalOutcome::new(SignalStatus::Ignored).symbol(symbol)
    }

    fn color_side(&self, signal: &Signal) -> Option<Side> {
        signal.color.as_deref().and_then(|c| self.palette.side_of(c))
    }

    // ─── Broker Actions ───────────────────────────────────────────────────────

    async fn close(&mut self, symbol: &Symbol, side: Side) -> SignalOutcome {
        let resp = self.broker.close_market(symbol, side).await;

        match resp.failure() {
            None => {
                info!(%symbol, %side, "✅ EXIT — position closed, now FLAT");
                self.position.flatten();
                SignalOutcome::new(SignalStatus::Exit).symbol(symbol).side(side).broker(resp)
            }
            Some(failure) => {
                warn!(
                    %symbol, %side, %failure,
                    "❌ Close failed — keeping position as open (desync risk; RESET to reconcile)"
                );
                SignalOutcome::new(SignalStatus::CloseFailed)
                    .symbol(symbol)
                    .side(side)
                    .broker(resp)
                    .error(failure)
            }
        }
    }

    async fn enter(&mut self, signal: &Signal, side: Side, bar_key: Option<String>) -> SignalOutcome {
        let symbol = &signal.symbol;
        let resp = self.broker.open_market(symbol, side).await;

        if let Some(failure) = resp.failure() {
            if matches!(failure, BrokerFailure::Transport(_)) {
                warn!(%symbol, %side, %failure, "❌ Entry unconfirmed — order may have executed; staying FLAT");
            } else {
                warn!(%symbol, %side, %failure, "❌ Entry rejected — staying FLAT");
            }
            return SignalOutcome::new(SignalStatus::EntryFailed)
                .symbol(symbol)
                .side(side)
                .broker(resp)
                .error(failure);
        }

        self.position.enter(symbol.clone(), side, bar_key);
        info!(%symbol, %side, "🎯 ENTER — position open");

        let stop_loss = match signal.stop_reference(side) {
            Some(price) => Some(self.place_stop_loss(symbol, side, price).await),
            None => None,
        };

        SignalOutcome::new(SignalStatus::entered(side))
            .symbol(symbol)
            .side(side)
            .broker(resp)
            .stop_loss(stop_loss)
    }

    /// Best-effort: a failure is reported, never rolled back or retried.
    async fn place_stop_loss(&self, symbol: &Symbol, side: Side, price: f64) -> StopLossReport {
        let resp = self.broker.set_stop_loss(symbol, side, price).await;
        let failure = resp.failure();

        match &failure {
            None => info!(%symbol, %side, trigger = %format_price(price), "🛡️ Stop-loss placed"),
            Some(f) => warn!(%symbol, %side, failure = %f, "⚠️ Stop-loss NOT placed — position is unprotected"),
        }

        StopLossReport {
            trigger_price: format_price(price),
            placed:        failure.is_none(),
            error:         failure.map(|f| f.to_string()),
            broker:        resp,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

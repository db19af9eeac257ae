//! # models::position
//!
//! [`GlobalPosition`] — ความเชื่อของระบบว่าตอนนี้ถือ Position อะไรอยู่
//!
//! ## Invariants
//! * `open == false` ⇒ `symbol == None && side == None`
//! * ทั้ง process มีได้แค่ 1 Position (single global book)
//!
//! Fields เป็น private ทั้งหมด เปลี่ยนได้ผ่าน `enter` / `adopt` / `flatten`
//! เท่านั้น จึงไม่มีทางสร้าง state ที่ผิด invariant ได้

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Symbol;

// ─── Side ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long  => "LONG",
            Side::Short => "SHORT",
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Long  => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── PositionState ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionState {
    Flat,
    LongOpen,
    ShortOpen,
}

// ─── GlobalPosition ───────────────────────────────────────────────────────────

/// The one position the process is allowed to hold.
///
/// Owned by the state machine; everything else sees a [`PositionSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct GlobalPosition {
    open:               bool,
    symbol:             Option<Symbol>,
    side:               Option<Side>,
    last_entry_bar_key: Option<String>,
    /// เวลาที่ state ถูกตั้งล่าสุด (entry หรือ resync)
    since:              Option<DateTime<Utc>>,
}

impl GlobalPosition {
    pub fn flat() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        self.symbol.as_ref()
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn last_entry_bar_key(&self) -> Option<&str> {
        self.last_entry_bar_key.as_deref()
    }

    pub fn state(&self) -> PositionState {
        match (self.open, self.side) {
            (true, Some(Side::Long))  => PositionState::LongOpen,
            (true, Some(Side::Short)) => PositionState::ShortOpen,
            _ => PositionState::Flat,
        }
    }

    /// True when a position is open on a symbol other than `symbol`.
    pub fn is_open_on_other(&self, symbol: &Symbol) -> bool {
        self.open && self.symbol.as_ref().is_some_and(|s| s != symbol)
    }

    /// Record a confirmed entry.
    pub fn enter(&mut self, symbol: Symbol, side: Side, bar_key: Option<String>) {
        self.open = true;
        self.symbol = Some(symbol);
        self.side = Some(side);
        self.since = Some(Utc::now());
        self.last_entry_bar_key = bar_key;
    }

    /// Overwrite local belief with the exchange's record. Keeps the bar key.
    pub fn adopt(&mut self, symbol: Symbol, side: Side) {
        self.open = true;
        self.symbol = Some(symbol);
        self.side = Some(side);
        self.since = Some(Utc::now());
    }

    /// Back to FLAT. The bar key is left alone: it is scoped by bar timestamp,
    /// so it cannot suppress an entry on a later bar.
    pub fn flatten(&mut self) {
        self.open = false;
        self.symbol = None;
        self.side = None;
        self.since = None;
    }

    pub fn clear_bar_key(&mut self) {
        self.last_entry_bar_key = None;
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot {
            state:              self.state(),
            open:               self.open,
            symbol:             self.symbol.clone(),
            side:               self.side,
            last_entry_bar_key: self.last_entry_bar_key.clone(),
            since:              self.since,
        }
    }
}

// ─── PositionSnapshot ─────────────────────────────────────────────────────────

/// Read-only copy handed to routes and logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSnapshot {
    pub state:              PositionState,
    pub open:               bool,
    pub symbol:             Option<Symbol>,
    pub side:               Option<Side>,
    pub last_entry_bar_key: Option<String>,
    pub since:              Option<DateTime<Utc>>,
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn consistent(p: &GlobalPosition) -> bool {
        if p.is_open() {
            p.symbol().is_some() && p.side().is_some()
        } else {
            p.symbol().is_none() && p.side().is_none()
        }
    }

    #[test]
    fn test_starts_flat() {
        let p = GlobalPosition::flat();
        assert_eq!(p.state(), PositionState::Flat);
        assert!(consistent(&p));
    }

    #[test]
    fn test_enter_then_flatten_keeps_bar_key() {
        let mut p = GlobalPosition::flat();
        p.enter(Symbol::from("BTCUSDT"), Side::Long, Some("k1".into()));
        assert_eq!(p.state(), PositionState::LongOpen);
        assert!(consistent(&p));

        p.flatten();
        assert_eq!(p.state(), PositionState::Flat);
        assert!(consistent(&p));
        assert_eq!(p.last_entry_bar_key(), Some("k1"));
    }

    #[test]
    fn test_enter_without_bar_replaces_previous_key() {
        let mut p = GlobalPosition::flat();
        p.enter(Symbol::from("BTCUSDT"), Side::Long, Some("k1".into()));
        p.flatten();
        p.enter(Symbol::from("ETHUSDT"), Side::Short, None);
        assert_eq!(p.last_entry_bar_key(), None);
    }

    #[test]
    fn test_adopt_overwrites_side_and_symbol() {
        let mut p = GlobalPosition::flat();
        p.enter(Symbol::from("BTCUSDT"), Side::Long, None);
        p.adopt(Symbol::from("ETHUSDT"), Side::Short);
        assert_eq!(p.state(), PositionState::ShortOpen);
        assert_eq!(p.symbol().map(Symbol::as_str), Some("ETHUSDT"));
    }

    #[test]
    fn test_open_on_other() {
        let mut p = GlobalPosition::flat();
        let btc = Symbol::from("BTCUSDT");
        assert!(!p.is_open_on_other(&btc));
        p.enter(btc.clone(), Side::Short, None);
        assert!(!p.is_open_on_other(&btc));
        assert!(p.is_open_on_other(&Symbol::from("ETHUSDT")));
    }
}

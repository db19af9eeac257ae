//! # models::signal
//!
//! Defines [`Signal`], one parsed TradingView alert, and the raw
//! [`WebhookPayload`] it is validated from.
//!
//! TradingView placeholders (`{{low}}`, `{{time}}`) arrive as either numbers or
//! strings depending on how the alert message was written, so every optional
//! field is lenient: a value that cannot be read is treated as absent.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::{Side, Symbol};

// ─── Raw Payload ──────────────────────────────────────────────────────────────

/// The webhook body exactly as TradingView posts it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub secret: Option<String>,

    #[serde(default)]
    pub ticker: Option<String>,

    #[serde(default)]
    pub event: Option<String>,

    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub action: Option<String>,

    #[serde(default, alias = "interval", deserialize_with = "lenient_string")]
    pub timeframe: Option<String>,

    #[serde(default, alias = "barTimestamp", alias = "time", deserialize_with = "lenient_string")]
    pub bar_time: Option<String>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub low: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub high: Option<f64>,
}

impl WebhookPayload {
    /// Parse a body leniently: anything that is not a JSON object becomes an
    /// empty payload (which then fails the secret check).
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ─── Event / Action ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// Coloured vector candle: entry or opposite-colour exit.
    Vector,
    /// Operator asks for a resync against the exchange.
    Reset,
    Other,
}

impl SignalEvent {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_uppercase()).as_deref() {
            Some("VECTOR") => SignalEvent::Vector,
            Some("RESET")  => SignalEvent::Reset,
            _ => SignalEvent::Other,
        }
    }
}

/// Explicit exit instruction (Stoch RSI cross on the chart side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitAction {
    ExitLong,
    ExitShort,
}

impl ExitAction {
    fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.map(|s| s.trim().to_uppercase()).as_deref() {
            Some("EXIT_LONG")  => Some(ExitAction::ExitLong),
            Some("EXIT_SHORT") => Some(ExitAction::ExitShort),
            _ => None,
        }
    }

    /// The position side this action closes.
    pub fn closes(self) -> Side {
        match self {
            ExitAction::ExitLong  => Side::Long,
            ExitAction::ExitShort => Side::Short,
        }
    }
}

// ─── Signal ───────────────────────────────────────────────────────────────────

/// One authenticated, normalised alert handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub symbol:    Symbol,
    pub event:     SignalEvent,
    /// Lower-cased colour name, if any.
    pub color:     Option<String>,
    pub action:    Option<ExitAction>,
    pub timeframe: Option<String>,
    pub bar_time:  Option<String>,
    pub low:       Option<f64>,
    pub high:      Option<f64>,
}

impl Signal {
    /// Stop reference for an entry on `side`: `low` for longs, `high` for
    /// shorts, and only when strictly positive.
    pub fn stop_reference(&self, side: Side) -> Option<f64> {
        let price = match side {
            Side::Long  => self.low,
            Side::Short => self.high,
        };
        price.filter(|p| *p > 0.0)
    }

    /// Fingerprint of (symbol, timeframe, bar, side) used for same-bar
    /// entry suppression. `None` when the alert carries no bar timestamp,
    /// since there is no bar to fingerprint.
    pub fn bar_key(&self, side: Side) -> Option<String> {
        let bar = self.bar_time.as_deref()?;
        Some(format!(
            "{}|{}|{}|{}",
            self.symbol,
            self.timeframe.as_deref().unwrap_or(""),
            bar,
            side
        ))
    }
}

impl From<WebhookPayload> for Signal {
    fn from(p: WebhookPayload) -> Self {
        Self {
            symbol:    Symbol::normalize(p.ticker.as_deref().unwrap_or("")),
            event:     SignalEvent::parse(p.event.as_deref()),
            color:     p
                .color
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty()),
            action:    ExitAction::parse(p.action.as_deref()),
            timeframe: p.timeframe,
            bar_time:  p.bar_time,
            low:       p.low,
            high:      p.high,
        }
    }
}

// ─── ColorPalette ─────────────────────────────────────────────────────────────

/// Which vector colours mean LONG and which mean SHORT.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPalette {
    pub long:  Vec<String>,
    pub short: Vec<String>,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            long:  vec!["green".into(), "blue".into()],
            short: vec!["red".into(), "pink".into(), "purple".into()],
        }
    }
}

impl ColorPalette {
    /// Side a colour maps to; `None` for colours in neither palette.
    pub fn side_of(&self, color: &str) -> Option<Side> {
        if self.long.iter().any(|c| c == color) {
            Some(Side::Long)
        } else if self.short.iter().any(|c| c == color) {
            Some(Side::Short)
        } else {
            None
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

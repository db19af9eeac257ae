//! # models::symbol
//!
//! **Symbol Normalizer** — แปลง ticker จาก TradingView ให้ตรงกับชื่อ contract
//! ของ BitMart
//!
//! ```text
//! " btcusdt.p "         → BTCUSDT
//! "BITMART:ETHUSDT.P"   → ETHUSDT
//! "dogeusdt"            → DOGEUSDT   (ไม่อยู่ใน allow-list → ถูก ignore ภายหลัง)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Perpetual-contract marker TradingView appends to futures tickers.
const PERPETUAL_SUFFIX: &str = ".P";

/// Exchange-spelled contract symbol, always upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Canonicalise a raw ticker. Total: never fails, garbage in gives an
    /// upper-cased string that simply won't match the allow-list.
    pub fn normalize(raw: &str) -> Self {
        let mut s = raw.trim().to_uppercase();

        // "BITMART:BTCUSDT.P": drop the chart's exchange prefix
        if let Some(idx) = s.rfind(':') {
            s = s[idx + 1..].trim().to_string();
        }

        if let Some(stripped) = s.strip_suffix(PERPETUAL_SUFFIX) {
            s = stripped.to_string();
        }

        Self(s)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Self::normalize(raw)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_perpetual_suffix() {
        assert_eq!(Symbol::normalize("BTCUSDT.P").as_str(), "BTCUSDT");
    }

    #[test]
    fn test_uppercases_and_trims() {
        assert_eq!(Symbol::normalize("  ethusdt.p \n").as_str(), "ETHUSDT");
        assert_eq!(Symbol::normalize("solusdt").as_str(), "SOLUSDT");
    }

    #[test]
    fn test_drops_exchange_prefix() {
        assert_eq!(Symbol::normalize("BITMART:SOLUSDT.P").as_str(), "SOLUSDT");
    }

    #[test]
    fn test_only_trailing_suffix_removed() {
        // ".P" in the middle is part of the name
        assert_eq!(Symbol::normalize("A.PUSDT").as_str(), "A.PUSDT");
    }

    #[test]
    fn test_empty_input_is_total() {
        assert!(Symbol::normalize("").is_empty());
        assert!(Symbol::normalize("   ").is_empty());
    }
}

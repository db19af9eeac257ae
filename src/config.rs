//! # config
//!
//! Runtime configuration, read once at startup from environment variables
//! (`.env` is loaded first by `main`).  Read-only afterwards.
//!
//! | Variable                 | Default                   |
//! |--------------------------|---------------------------|
//! | `BIND_ADDR`              | `0.0.0.0:3000`            |
//! | `WEBHOOK_SECRET`         | — required                |
//! | `API_KEY`                | empty (admin routes open) |
//! | `ALLOWED_SYMBOLS`        | `BTCUSDT,ETHUSDT,SOLUSDT` |
//! | `POSITION_SIZE`          | `1`                       |
//! | `POSITION_SIZE_<SYMBOL>` | falls back to default     |
//! | `LEVERAGE`               | `10`                      |
//! | `MARGIN_MODE`            | `isolated`                |
//! | `LONG_COLORS`            | `green,blue`              |
//! | `SHORT_COLORS`           | `red,pink,purple`         |
//! | `BROKER_MODE`            | `paper`                   |
//! | `BITMART_BASE_URL`       | depends on mode           |
//! | `BITMART_API_KEY` / `BITMART_API_SECRET` / `BITMART_MEMO` | required for live/demo |
//! | `BROKER_TIMEOUT_SECS`    | `12`                      |
//! | `RESYNC_ON_STARTUP`      | `false`                   |

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::{ColorPalette, Symbol};

pub const LIVE_BASE_URL: &str = "https://api-cloud-v2.bitmart.com";
pub const DEMO_BASE_URL: &str = "https://demo-api-cloud-v2.bitmart.com";

const DEFAULT_SYMBOLS: &str = "BTCUSDT,ETHUSDT,SOLUSDT";
const MIN_TIMEOUT_SECS: u64 = 10;
const MAX_TIMEOUT_SECS: u64 = 15;

// ─── Enums ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerMode {
    /// Real money.
    Live,
    /// BitMart simulated trading. Same protocol, different host.
    Demo,
    /// In-process simulated exchange; no network at all.
    Paper,
}

impl BrokerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BrokerMode::Live  => "live",
            BrokerMode::Demo  => "demo",
            BrokerMode::Paper => "paper",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarginMode {
    Isolated,
    Cross,
}

impl MarginMode {
    /// BitMart `open_type` value.
    pub fn as_str(self) -> &'static str {
        match self {
            MarginMode::Isolated => "isolated",
            MarginMode::Cross    => "cross",
        }
    }
}

// ─── Credentials ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Credentials {
    pub api_key:    String,
    pub secret_key: String,
    /// BitMart "memo" chosen when the API key was created; part of the signature.
    pub memo:       String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .field("memo", &"<redacted>")
            .finish()
    }
}

// ─── Sub-configs ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub mode:        BrokerMode,
    pub base_url:    String,
    /// `None` only in paper mode.
    pub credentials: Option<Credentials>,
    pub timeout:     Duration,
}

/// Order parameters applied to every open.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    pub leverage:     u32,
    pub margin_mode:  MarginMode,
    pub default_size: u32,
    pub sizes:        HashMap<Symbol, u32>,
}

impl TradingConfig {
    /// Contracts to trade on `symbol`.
    pub fn size_for(&self, symbol: &Symbol) -> u32 {
        self.sizes.get(symbol).copied().unwrap_or(self.default_size)
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            leverage:     10,
            margin_mode:  MarginMode::Isolated,
            default_size: 1,
            sizes:        HashMap::new(),
        }
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr:         String,
    pub webhook_secret:    String,
    /// `None` = dev mode, admin routes are open.
    pub api_key:           Option<String>,
    /// Ordered: this is also the resync search order.
    pub allowed_symbols:   Vec<Symbol>,
    pub palette:           ColorPalette,
    pub trading:           TradingConfig,
    pub broker:            BrokerConfig,
    pub resync_on_startup: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source. `from_env` passes the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // ── Symbols ───────────────────────────────────────────────────────────
        let allowed_symbols = parse_symbols(&get("ALLOWED_SYMBOLS").unwrap_or_else(|| DEFAULT_SYMBOLS.into()));
        if allowed_symbols.is_empty() {
            return Err(ConfigError::Invalid {
                key:    "ALLOWED_SYMBOLS".into(),
                value:  get("ALLOWED_SYMBOLS").unwrap_or_default(),
                reason: "at least one symbol required",
            });
        }

        // ── Sizes ─────────────────────────────────────────────────────────────
        let default_size = match get("POSITION_SIZE") {
            Some(v) => parse_size("POSITION_SIZE", &v)?,
            None => 1,
        };
        let mut sizes = HashMap::new();
        for symbol in &allowed_symbols {
            let key = format!("POSITION_SIZE_{symbol}");
            if let Some(v) = get(key.as_str()) {
                sizes.insert(symbol.clone(), parse_size(&key, &v)?);
            }
        }

        let leverage = match get("LEVERAGE") {
            Some(v) => parse_size("LEVERAGE", &v)?,
            None => 10,
        };

        let margin_mode = match get("MARGIN_MODE").map(|v| v.to_lowercase()).as_deref() {
            None | Some("isolated") => MarginMode::Isolated,
            Some("cross") => MarginMode::Cross,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key:    "MARGIN_MODE".into(),
                    value:  other.into(),
                    reason: "expected isolated or cross",
                })
            }
        };

        // ── Palette ───────────────────────────────────────────────────────────
        let mut palette = ColorPalette::default();
        if let Some(v) = get("LONG_COLORS") {
            palette.long = parse_list(&v);
        }
        if let Some(v) = get("SHORT_COLORS") {
            palette.short = parse_list(&v);
        }
        if let Some(shared) = palette.long.iter().find(|c| palette.short.contains(c)) {
            return Err(ConfigError::Invalid {
                key:    "SHORT_COLORS".into(),
                value:  shared.clone(),
                reason: "colour is also listed in LONG_COLORS",
            });
        }

        // ── Broker ────────────────────────────────────────────────────────────
        let mode = match get("BROKER_MODE").map(|v| v.to_lowercase()).as_deref() {
            None | Some("paper") => BrokerMode::Paper,
            Some("demo") => BrokerMode::Demo,
            Some("live") => BrokerMode::Live,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key:    "BROKER_MODE".into(),
                    value:  other.into(),
                    reason: "expected live, demo or paper",
                })
            }
        };

        let credentials = match mode {
            BrokerMode::Paper => None,
            BrokerMode::Live | BrokerMode::Demo => Some(Credentials {
                api_key:    get("BITMART_API_KEY").ok_or(ConfigError::Missing("BITMART_API_KEY"))?,
                secret_key: get("BITMART_API_SECRET").ok_or(ConfigError::Missing("BITMART_API_SECRET"))?,
                memo:       get("BITMART_MEMO").ok_or(ConfigError::Missing("BITMART_MEMO"))?,
            }),
        };

        let base_url = get("BITMART_BASE_URL")
            .unwrap_or_else(|| match mode {
                BrokerMode::Demo => DEMO_BASE_URL.into(),
                BrokerMode::Live | BrokerMode::Paper => LIVE_BASE_URL.into(),
            })
            .trim_end_matches('/')
            .to_string();

        let timeout_secs = get("BROKER_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(12)
            .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);

        Ok(Self {
            bind_addr:      get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            webhook_secret: get("WEBHOOK_SECRET").ok_or(ConfigError::Missing("WEBHOOK_SECRET"))?,
            api_key:        get("API_KEY"),
            allowed_symbols,
            palette,
            trading: TradingConfig {
                leverage,
                margin_mode,
                default_size,
                sizes,
            },
            broker: BrokerConfig {
                mode,
                base_url,
                credentials,
                timeout: Duration::from_secs(timeout_secs),
            },
            resync_on_startup: get("RESYNC_ON_STARTUP")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_symbols(raw: &str) -> Vec<Symbol> {
    let mut out: Vec<Symbol> = Vec::new();
    for symbol in raw.split(',').map(Symbol::normalize).filter(|s| !s.is_empty()) {
        if !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}

fn parse_size(key: &str, raw: &str) -> Result<u32, ConfigError> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            key:    key.to_string(),
            value:  raw.to_string(),
            reason: "expected a positive integer",
        }),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_defaults_in_paper_mode() {
        let cfg = Config::from_lookup(lookup(&[("WEBHOOK_SECRET", "s3cret")])).unwrap();
        assert_eq!(cfg.broker.mode, BrokerMode::Paper);
        assert!(cfg.broker.credentials.is_none());
        assert_eq!(cfg.broker.timeout, Duration::from_secs(12));
        assert_eq!(
            cfg.allowed_symbols,
            vec![Symbol::from("BTCUSDT"), Symbol::from("ETHUSDT"), Symbol::from("SOLUSDT")]
        );
        assert_eq!(cfg.trading.leverage, 10);
        assert_eq!(cfg.trading.margin_mode, MarginMode::Isolated);
        assert!(cfg.api_key.is_none());
        assert!(!cfg.resync_on_startup);
    }

    #[test]
    fn test_secret_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("WEBHOOK_SECRET"));
    }

    #[test]
    fn test_live_mode_requires_credentials() {
        let err = Config::from_lookup(lookup(&[
            ("WEBHOOK_SECRET", "s"),
            ("BROKER_MODE", "live"),
            ("BITMART_API_KEY", "k"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("BITMART_API_SECRET"));
    }

    #[test]
    fn test_demo_mode_uses_demo_host() {
        let cfg = Config::from_lookup(lookup(&[
            ("WEBHOOK_SECRET", "s"),
            ("BROKER_MODE", "DEMO"),
            ("BITMART_API_KEY", "k"),
            ("BITMART_API_SECRET", "sk"),
            ("BITMART_MEMO", "m"),
        ]))
        .unwrap();
        assert_eq!(cfg.broker.mode, BrokerMode::Demo);
        assert_eq!(cfg.broker.base_url, DEMO_BASE_URL);
        assert_eq!(cfg.broker.credentials.unwrap().memo, "m");
    }

    #[test]
    fn test_per_symbol_sizes_and_order() {
        let cfg = Config::from_lookup(lookup(&[
            ("WEBHOOK_SECRET", "s"),
            ("ALLOWED_SYMBOLS", "solusdt.p, BTCUSDT ,SOLUSDT"),
            ("POSITION_SIZE", "3"),
            ("POSITION_SIZE_BTCUSDT", "7"),
        ]))
        .unwrap();
        assert_eq!(cfg.allowed_symbols, vec![Symbol::from("SOLUSDT"), Symbol::from("BTCUSDT")]);
        assert_eq!(cfg.trading.size_for(&Symbol::from("BTCUSDT")), 7);
        assert_eq!(cfg.trading.size_for(&Symbol::from("SOLUSDT")), 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Config::from_lookup(lookup(&[("WEBHOOK_SECRET", "s"), ("POSITION_SIZE", "0")])).is_err());
        assert!(Config::from_lookup(lookup(&[("WEBHOOK_SECRET", "s"), ("MARGIN_MODE", "hedge")])).is_err());
        assert!(Config::from_lookup(lookup(&[("WEBHOOK_SECRET", "s"), ("BROKER_MODE", "prod")])).is_err());
        assert!(Config::from_lookup(lookup(&[("WEBHOOK_SECRET", "s"), ("ALLOWED_SYMBOLS", " , ")])).is_err());
    }

    #[test]
    fn test_overlapping_palettes_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("WEBHOOK_SECRET", "s"),
            ("LONG_COLORS", "green,Blue"),
            ("SHORT_COLORS", "red, blue"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key:    "SHORT_COLORS".into(),
                value:  "blue".into(),
                reason: "colour is also listed in LONG_COLORS",
            }
        );

        // Default short palette against a custom long one
        assert!(Config::from_lookup(lookup(&[("WEBHOOK_SECRET", "s"), ("LONG_COLORS", "green,pink")])).is_err());
    }

    #[test]
    fn test_timeout_is_clamped() {
        let cfg = Config::from_lookup(lookup(&[("WEBHOOK_SECRET", "s"), ("BROKER_TIMEOUT_SECS", "60")])).unwrap();
        assert_eq!(cfg.broker.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials {
            api_key:    "key".into(),
            secret_key: "very-secret".into(),
            memo:       "memo".into(),
        };
        assert!(!format!("{creds:?}").contains("very-secret"));
    }
}

//! # tvbridge — TradingView → BitMart Futures Signal Bridge
//!
//! ```text
//!  ┌─────────────┐  POST /webhook        ┌───────────────────────────────┐
//!  │ TradingView │ ───────────────────▶  │ SignalDispatcher (Mutex)      │
//!  │   alerts    │                        │ └─ PositionMachine            │
//!  └─────────────┘                        │    ├─ GlobalPosition          │
//!                                         │    └─ Reconciler ─────────┐   │
//!  ┌─────────────┐  GET  /api/health      └───────────┬───────────────┘   │
//!  │  Operator   │  GET  /api/position                │ Broker trait      │
//!  └─────────────┘  POST /api/resync                  ▼                   ▼
//!                                         BitMart V2 (live / demo) · Paper
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod auth;
mod broker;
mod config;
mod engine;
mod error;
mod models;
mod routes;
mod state;

use broker::{bitmart::BitmartClient, paper::PaperBroker, Broker};
use config::{BrokerMode, Config};
use engine::SignalStatus;
use state::build_state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("tvbridge=debug".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════════════╗
  ║         TVBRIDGE — TradingView → BitMart Futures      ║
  ║   Signal · State Machine · Reconciler · Stop-Loss     ║
  ╚═══════════════════════════════════════════════════════╝"#);

    // ── 3. Config ─────────────────────────────────────────────────────────────
    let config = Config::from_env().context("invalid configuration")?;
    info!(
        mode = config.broker.mode.as_str(),
        base_url = %config.broker.base_url,
        symbols = ?config.allowed_symbols,
        leverage = config.trading.leverage,
        margin = config.trading.margin_mode.as_str(),
        "⚙️ Config loaded"
    );

    // ── 4. Broker ─────────────────────────────────────────────────────────────
    let broker = build_broker(&config)?;

    // ── 5. Shared state ───────────────────────────────────────────────────────
    let resync_on_startup = config.resync_on_startup;
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid BIND_ADDR {:?}", config.bind_addr))?;
    let state = build_state(config, broker);

    // ── 6. Startup resync (optional) ──────────────────────────────────────────
    if resync_on_startup {
        let outcome = state.dispatcher.resync(None).await;
        if outcome.status == SignalStatus::Resynced {
            info!(symbol = ?outcome.symbol, side = ?outcome.side, "🔄 Startup resync done");
        } else {
            warn!(error = ?outcome.error, "⚠️ Startup resync failed — starting FLAT");
        }
    }

    // ── 7. Router ─────────────────────────────────────────────────────────────
    let app = routes::router(state);

    // ── 8. Bind & Serve ───────────────────────────────────────────────────────
    info!(?addr, "🚀 tvbridge server starting");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_broker(config: &Config) -> anyhow::Result<Arc<dyn Broker>> {
    let broker: Arc<dyn Broker> = match (config.broker.mode, &config.broker.credentials) {
        (BrokerMode::Paper, _) => {
            info!("🎭 Paper mode — orders are simulated in-process");
            Arc::new(PaperBroker::new(config.trading.clone()))
        }
        (BrokerMode::Live | BrokerMode::Demo, Some(credentials)) => {
            let http = reqwest::Client::builder()
                .build()
                .context("failed to build HTTP client")?;
            Arc::new(BitmartClient::new(
                http,
                config.broker.base_url.clone(),
                credentials.clone(),
                config.trading.clone(),
                config.broker.timeout,
            ))
        }
        (mode, None) => anyhow::bail!("broker mode {} requires BitMart credentials", mode.as_str()),
    };
    Ok(broker)
}

//! VERITY — Dual-Staking Settlement & Reputation Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores engine state from disk (or starts fresh), serves the read
//! surface, and autosaves state until shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use verity::config;
use verity::dashboard::routes::DashboardState;
use verity::dashboard::spawn_dashboard;
use verity::engine::Engine;
use verity::storage;

const BANNER: &str = r#"
__     _______ ____  ___ _______   __
\ \   / / ____|  _ \|_ _|_   _\ \ / /
 \ \ / /|  _| | |_) || |  | |  \ V /
  \ V / | |___|  _ < | |  | |   | |
   \_/  |_____|_| \_\___| |_|   |_|

  Dual-Staking Settlement & Reputation Engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML; every section has defaults, so a
    // missing file means a default run, not a crash.
    let cfg = match config::AppConfig::load("config.toml") {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config.toml not loaded ({e:#}); using defaults");
            config::AppConfig::default()
        }
    };

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        service = %cfg.service.name,
        currency = %cfg.service.currency,
        min_stake = %cfg.engine.min_stake,
        fee_rate = %cfg.engine.fee_rate,
        autosave_secs = cfg.service.autosave_interval_secs,
        "VERITY starting up"
    );

    // -- Restore or create engine state -----------------------------------

    let state_file = cfg.storage.state_file.clone();
    let engine = Arc::new(Engine::new(cfg.engine.engine_config()));

    match storage::load_state(state_file.as_deref())? {
        Some(snapshot) => {
            info!(
                news = snapshot.news.len(),
                pools = snapshot.pools.len(),
                users = snapshot.reputation.len(),
                "Resumed from saved state"
            );
            engine.restore(snapshot);
        }
        None => {
            info!("Fresh start");
        }
    }

    // -- Read surface ------------------------------------------------------

    if cfg.dashboard.enabled {
        let dash_state = Arc::new(DashboardState::new(
            Arc::clone(&engine),
            &cfg.service.name,
            &cfg.service.currency,
        ));
        spawn_dashboard(dash_state, cfg.dashboard.port)?;
    } else {
        warn!("Dashboard disabled — engine is reachable only in-process");
    }

    // -- Autosave loop -----------------------------------------------------

    let mut interval =
        tokio::time::interval(Duration::from_secs(cfg.service.autosave_interval_secs.max(1)));
    interval.tick().await; // first tick fires immediately
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.service.autosave_interval_secs,
        "Entering autosave loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = storage::save_state(&engine.snapshot(), state_file.as_deref()) {
                    error!(error = %e, "Autosave failed");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    // Save final state
    let snapshot = engine.snapshot();
    storage::save_state(&snapshot, state_file.as_deref())?;
    info!(
        news = snapshot.news.len(),
        pools = snapshot.pools.len(),
        users = snapshot.reputation.len(),
        "VERITY shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("verity=info"));

    let json_logging = std::env::var("VERITY_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

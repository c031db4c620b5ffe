//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults, so a partial file (or an empty one) still
//! yields a runnable configuration.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;

use crate::engine::EngineConfig;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    /// How often engine state is flushed to disk.
    pub autosave_interval_secs: u64,
    pub currency: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "VERITY-001".to_string(),
            autosave_interval_secs: 30,
            currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    /// Minimum accepted stake, in units of the settlement currency.
    pub min_stake: Decimal,
    /// Protocol fee taken from the whole pool at settlement.
    pub fee_rate: Decimal,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_stake: dec!(1),
            fee_rate: dec!(0.02),
        }
    }
}

impl EngineSettings {
    /// The engine-facing view of these settings.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            min_stake: self.min_stake,
            fee_rate: self.fee_rate,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// State file path; the storage module's default is used when unset.
    pub state_file: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }
}

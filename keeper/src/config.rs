//! Keeper configuration

use anyhow::{Context, Result};
use perpetual_ledger::{AccountId, MarketParams};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "LEDGER_KEEPER_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "~/.config/ledger-keeper/keeper.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Parameters of the market being replayed
    pub market: MarketParams,

    /// JSON-lines journal of prices and account operations
    pub journal_path: String,

    /// Seconds between journal polls in follow mode
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Account credited with liquidation fees
    pub liquidator: AccountId,

    /// Maximum liquidations issued per tick
    #[serde(default = "default_batch_size")]
    pub max_liquidations_per_batch: usize,

    /// Keep polling the journal after the first pass
    #[serde(default)]
    pub follow: bool,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_batch_size() -> usize {
    10
}

impl Config {
    /// Load from `$LEDGER_KEEPER_CONFIG`, falling back to the user config dir
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(&path)
    }

    pub fn from_path(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        let content = std::fs::read_to_string(expanded.as_ref())
            .with_context(|| format!("Failed to read config file {}", expanded))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config file {}", expanded))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.market.validate().context("Invalid market parameters")?;
        if config.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        Ok(config)
    }

    pub fn journal_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.journal_path).as_ref())
    }
}

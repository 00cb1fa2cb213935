//! Configuration structures for the FX backtest engine.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Currency, Pair};

/// Main configuration for a backtest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backtest configuration.
    pub backtest: BacktestConfig,
    /// Execution configuration.
    pub execution: ExecutionConfig,
}

impl Config {
    /// Parse a configuration from JSON. Missing sections fall back to defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Check the values a run cannot start without.
    pub fn validate(&self) -> Result<()> {
        if self.backtest.pairs.is_empty() {
            return Err(Error::config("at least one pair must be tracked"));
        }
        if self.backtest.initial_equity <= Decimal::ZERO {
            return Err(Error::config(format!(
                "initial equity must be positive, got {}",
                self.backtest.initial_equity
            )));
        }
        if self.execution.slippage < Decimal::ZERO {
            return Err(Error::config(format!(
                "slippage must not be negative, got {}",
                self.execution.slippage
            )));
        }
        Ok(())
    }
}

/// Backtest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Currency balance and equity are reported in.
    pub home_currency: Currency,
    /// Tracked pairs, in their canonical direction.
    pub pairs: Vec<Pair>,
    /// Starting balance in home currency.
    pub initial_equity: Decimal,
    /// Loop stops after this many iterations even if ticks remain.
    pub max_iters: u64,
    /// Pause between loop iterations in milliseconds (0 for a pure backtest).
    pub heartbeat_ms: u64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        let pair = |base: [u8; 3], quote: [u8; 3]| Pair {
            base: Currency::from_ascii(base),
            quote: Currency::from_ascii(quote),
        };
        Self {
            home_currency: Currency::from_ascii(*b"GBP"),
            pairs: vec![pair(*b"GBP", *b"USD"), pair(*b"EUR", *b"USD")],
            initial_equity: Decimal::from(100_000),
            max_iters: 100_000_000,
            heartbeat_ms: 0,
        }
    }
}

/// Simulated execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Price offset against the trader on market fills.
    pub slippage: Decimal,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            slippage: Decimal::ZERO,
        }
    }
}

//! Core types and configuration for the FX backtest engine.
//!
//! This crate provides shared types used by the backtest crate:
//! - Currencies, pairs, quotes and the closed event set
//! - The bid/ask price cache with pair inversion
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod prices;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use prices::PriceCache;
pub use types::*;

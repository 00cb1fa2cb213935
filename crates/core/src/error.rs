//! Error types for the FX backtest core.

use crate::types::{Pair, QuoteSide};
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the FX backtest core.
#[derive(Error, Debug)]
pub enum Error {
    /// A required bid/ask is unknown.
    #[error("Missing price data: {side} for {pair} is unknown")]
    MissingPriceData { pair: Pair, side: QuoteSide },

    /// Fill rejected before it touched the ledger.
    #[error("Invalid fill: {0}")]
    InvalidFill(String),

    /// Signal that cannot be turned into an order.
    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    /// Quote violating bid <= ask or carrying a non-positive price.
    #[error("Invalid quote: {0}")]
    InvalidQuote(String),

    /// Decimal arithmetic left the representable range.
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Malformed currency or pair symbol.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Create a missing price data error.
    pub fn missing_price(pair: Pair, side: QuoteSide) -> Self {
        Error::MissingPriceData { pair, side }
    }

    /// Create an invalid fill error.
    pub fn invalid_fill(msg: impl Into<String>) -> Self {
        Error::InvalidFill(msg.into())
    }

    /// Create an invalid signal error.
    pub fn invalid_signal(msg: impl Into<String>) -> Self {
        Error::InvalidSignal(msg.into())
    }

    /// Create an invalid quote error.
    pub fn invalid_quote(msg: impl Into<String>) -> Self {
        Error::InvalidQuote(msg.into())
    }

    /// Create an arithmetic overflow error.
    pub fn overflow(msg: impl Into<String>) -> Self {
        Error::Overflow(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Data conditions the event loop skips over instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MissingPriceData { .. }
                | Error::InvalidFill(_)
                | Error::InvalidSignal(_)
                | Error::InvalidQuote(_)
                | Error::Overflow(_)
        )
    }
}

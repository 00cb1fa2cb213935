//! Core data types for the FX backtest engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Simulated wall-clock time of an event.
pub type Timestamp = DateTime<Utc>;

/// ISO-style three-letter currency code (e.g., "GBP").
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// Parse a currency code; accepts three ASCII letters in any case.
    pub fn new(code: &str) -> Result<Self> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(Error::parse(format!("invalid currency code '{code}'")));
        }
        Ok(Self([
            bytes[0].to_ascii_uppercase(),
            bytes[1].to_ascii_uppercase(),
            bytes[2].to_ascii_uppercase(),
        ]))
    }

    /// Build from a code known to be three uppercase ASCII letters.
    pub(crate) const fn from_ascii(code: [u8; 3]) -> Self {
        Self(code)
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(&s)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.as_str().to_string()
    }
}

/// An ordered (base, quote) currency pair, rendered as "GBPUSD".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pair {
    /// Currency being bought or sold.
    pub base: Currency,
    /// Currency the price is expressed in.
    pub quote: Currency,
}

impl Pair {
    /// Create a pair from two distinct currencies.
    pub fn new(base: Currency, quote: Currency) -> Result<Self> {
        if base == quote {
            return Err(Error::parse(format!("pair needs two distinct currencies, got {base}{quote}")));
        }
        Ok(Self { base, quote })
    }

    /// The reciprocal quotation (quote, base).
    #[inline]
    pub fn inverse(self) -> Self {
        Self {
            base: self.quote,
            quote: self.base,
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}

impl fmt::Debug for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pair({}{})", self.base, self.quote)
    }
}

impl FromStr for Pair {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 6 || !s.is_ascii() {
            return Err(Error::parse(format!("invalid pair symbol '{s}'")));
        }
        Self::new(Currency::new(&s[..3])?, Currency::new(&s[3..])?)
    }
}

impl TryFrom<String> for Pair {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Pair> for String {
    fn from(p: Pair) -> Self {
        p.to_string()
    }
}

/// Which side of a quote an operation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSide {
    Bid,
    Ask,
}

impl fmt::Display for QuoteSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteSide::Bid => f.write_str("bid"),
            QuoteSide::Ask => f.write_str("ask"),
        }
    }
}

/// Latest bid/ask for a pair. An unset side means "no liquidity / unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Price at which the market buys the base currency.
    pub bid: Option<Decimal>,
    /// Price at which the market sells the base currency.
    pub ask: Option<Decimal>,
    /// Time of the tick that produced this quote.
    pub timestamp: Option<Timestamp>,
}

impl Quote {
    /// Read one side of the quote.
    #[inline]
    pub fn side(&self, side: QuoteSide) -> Option<Decimal> {
        match side {
            QuoteSide::Bid => self.bid,
            QuoteSide::Ask => self.ask,
        }
    }

    /// Spread (ask - bid), when both sides are known.
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.ask? - self.bid?)
    }

    /// Quote for the reciprocal pair: inverse bid = 1/ask, inverse ask = 1/bid.
    pub fn inverted(&self) -> Self {
        let recip = |px: Decimal| Decimal::ONE.checked_div(px);
        Self {
            bid: self.ask.and_then(recip),
            ask: self.bid.and_then(recip),
            timestamp: self.timestamp,
        }
    }
}

/// Order type carried by signals and orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// Outcome reported by the fill simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStatus {
    Filled,
    Rejected,
}

/// Market data update for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub pair: Pair,
    pub timestamp: Timestamp,
    pub bid: Decimal,
    pub ask: Decimal,
}

/// Trade intent produced by a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Caller-chosen reference, carried through to the order and fill.
    pub reference: String,
    pub pair: Pair,
    pub order_type: OrderType,
    /// Signed size: positive buys the base currency, negative sells it.
    pub units: Decimal,
    pub timestamp: Timestamp,
    /// Required for limit signals, ignored for market signals.
    pub limit_price: Option<Decimal>,
}

impl Signal {
    /// Market signal; the execution price is resolved from the price cache.
    pub fn market(reference: impl Into<String>, pair: Pair, units: Decimal, timestamp: Timestamp) -> Self {
        Self {
            reference: reference.into(),
            pair,
            order_type: OrderType::Market,
            units,
            timestamp,
            limit_price: None,
        }
    }

    /// Limit signal at a fixed price.
    pub fn limit(
        reference: impl Into<String>,
        pair: Pair,
        units: Decimal,
        limit_price: Decimal,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            reference: reference.into(),
            pair,
            order_type: OrderType::Limit,
            units,
            timestamp,
            limit_price: Some(limit_price),
        }
    }
}

/// Order ready for execution. Always carries a resolved price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub reference: String,
    pub pair: Pair,
    pub units: Decimal,
    pub order_type: OrderType,
    pub timestamp: Timestamp,
    /// Limit price, or the market price resolved when the signal was translated.
    pub price: Decimal,
}

/// Execution report for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub reference: String,
    pub pair: Pair,
    pub units: Decimal,
    pub price: Decimal,
    pub status: FillStatus,
    pub timestamp: Timestamp,
}

/// Closed set of events flowing through the dispatch queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Tick(Tick),
    Signal(Signal),
    Order(Order),
    Fill(Fill),
}

impl Event {
    /// Short tag for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Tick(_) => "tick",
            Event::Signal(_) => "signal",
            Event::Order(_) => "order",
            Event::Fill(_) => "fill",
        }
    }

    /// Pair the event refers to.
    pub fn pair(&self) -> Pair {
        match self {
            Event::Tick(e) => e.pair,
            Event::Signal(e) => e.pair,
            Event::Order(e) => e.pair,
            Event::Fill(e) => e.pair,
        }
    }

    /// Event time.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Event::Tick(e) => e.timestamp,
            Event::Signal(e) => e.timestamp,
            Event::Order(e) => e.timestamp,
            Event::Fill(e) => e.timestamp,
        }
    }
}

impl From<Tick> for Event {
    fn from(e: Tick) -> Self {
        Event::Tick(e)
    }
}

impl From<Signal> for Event {
    fn from(e: Signal) -> Self {
        Event::Signal(e)
    }
}

impl From<Order> for Event {
    fn from(e: Order) -> Self {
        Event::Order(e)
    }
}

impl From<Fill> for Event {
    fn from(e: Fill) -> Self {
        Event::Fill(e)
    }
}

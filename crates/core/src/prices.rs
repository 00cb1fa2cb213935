//! Bid/ask price cache with currency-pair inversion.
//!
//! Every update to a pair also writes the algebraic inverse for the
//! reciprocal pair, so exposures can be priced in either direction.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::types::{Pair, Quote, QuoteSide, Timestamp};

/// Latest quote per pair, for tracked pairs and their inverses.
#[derive(Debug, Clone, Default)]
pub struct PriceCache {
    quotes: HashMap<Pair, Quote>,
}

impl PriceCache {
    /// Create a cache with unset quotes for the given pairs and their inverses.
    pub fn new(pairs: &[Pair]) -> Self {
        let mut quotes = HashMap::with_capacity(pairs.len() * 2);
        for &pair in pairs {
            quotes.insert(pair, Quote::default());
            quotes.insert(pair.inverse(), Quote::default());
        }
        Self { quotes }
    }

    /// Store a quote for `pair` and derive the inverse quote for the reciprocal pair.
    ///
    /// The side written last is authoritative: the derived inverse is
    /// overwritten whenever its counterpart updates.
    pub fn update(
        &mut self,
        pair: Pair,
        bid: Option<Decimal>,
        ask: Option<Decimal>,
        timestamp: Timestamp,
    ) -> Result<()> {
        for px in [bid, ask].into_iter().flatten() {
            if px <= Decimal::ZERO {
                return Err(Error::invalid_quote(format!("{pair}: non-positive price {px}")));
            }
        }
        if let (Some(b), Some(a)) = (bid, ask) {
            if b > a {
                return Err(Error::invalid_quote(format!("{pair}: bid {b} above ask {a}")));
            }
        }

        let quote = Quote {
            bid,
            ask,
            timestamp: Some(timestamp),
        };
        self.quotes.insert(pair.inverse(), quote.inverted());
        self.quotes.insert(pair, quote);
        Ok(())
    }

    /// Cached quote for a pair, or `None` if the pair was never seen.
    pub fn quote(&self, pair: Pair) -> Option<Quote> {
        self.quotes.get(&pair).copied()
    }

    /// One side of the cached quote, failing when it is unknown.
    pub fn price(&self, pair: Pair, side: QuoteSide) -> Result<Decimal> {
        self.quotes
            .get(&pair)
            .and_then(|q| q.side(side))
            .ok_or_else(|| Error::missing_price(pair, side))
    }

    /// Current bid for a pair.
    #[inline]
    pub fn bid(&self, pair: Pair) -> Result<Decimal> {
        self.price(pair, QuoteSide::Bid)
    }

    /// Current ask for a pair.
    #[inline]
    pub fn ask(&self, pair: Pair) -> Result<Decimal> {
        self.price(pair, QuoteSide::Ask)
    }

    /// Whether the cache has an entry (possibly unset) for the pair.
    pub fn contains(&self, pair: Pair) -> bool {
        self.quotes.contains_key(&pair)
    }

    /// Number of cached pairs, inverses included.
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

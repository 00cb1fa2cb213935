//! Position tracking for backtesting.
//!
//! One signed position per tracked pair, updated only by fills. Realized
//! P&L is reported in the pair's quote currency; conversion to the home
//! currency belongs to the ledger.

use std::collections::BTreeMap;

use fxbt_core::{Error, Pair, Result};
use rust_decimal::Decimal;
use serde::Serialize;

/// Net exposure in one pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    /// Pair the position is held in.
    pub pair: Pair,
    /// Signed size: positive is long the base currency.
    pub net_units: Decimal,
    /// Sum of price-weighted entry quantity (signed like `net_units`).
    pub entry_value: Decimal,
}

/// P&L realized by a single fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RealizedDelta {
    /// Units of the prior position that were closed, signed like that position.
    pub closed_units: Decimal,
    /// Average entry price of the closed units.
    pub entry_price: Decimal,
    /// Price the units were closed at.
    pub exit_price: Decimal,
    /// Realized P&L in quote currency.
    pub pnl: Decimal,
}

impl RealizedDelta {
    /// Whether the fill closed any units.
    #[inline]
    pub fn is_realized(&self) -> bool {
        !self.closed_units.is_zero()
    }
}

impl Position {
    /// Create a flat position.
    pub fn flat(pair: Pair) -> Self {
        Self {
            pair,
            net_units: Decimal::ZERO,
            entry_value: Decimal::ZERO,
        }
    }

    /// Check if the position is flat.
    #[inline]
    pub fn is_flat(&self) -> bool {
        self.net_units.is_zero()
    }

    /// Check if position is long.
    #[inline]
    pub fn is_long(&self) -> bool {
        self.net_units > Decimal::ZERO
    }

    /// Average entry price, `None` when flat.
    pub fn average_price(&self) -> Option<Decimal> {
        self.entry_value.checked_div(self.net_units)
    }

    /// Whether a fill of `units` would close some or all of this position.
    pub fn closes_with(&self, units: Decimal) -> bool {
        !self.is_flat() && !units.is_zero() && (units > Decimal::ZERO) != self.is_long()
    }

    /// Unrealized P&L in quote currency, marked at `current_price`.
    /// `None` if the value is out of range.
    pub fn unrealized(&self, current_price: Decimal) -> Option<Decimal> {
        // net * (current - entry_value / net), without the inexact division
        self.net_units
            .checked_mul(current_price)?
            .checked_sub(self.entry_value)
    }

    /// Apply a fill of `units` at `price`. On error the position is unchanged.
    pub fn apply(&mut self, units: Decimal, price: Decimal) -> Result<RealizedDelta> {
        let net = self.net_units;
        let new_net = in_range(net.checked_add(units), "net units")?;
        let notional = in_range(units.checked_mul(price), "fill notional")?;

        // Opening or growing.
        if !self.closes_with(units) {
            self.entry_value = in_range(self.entry_value.checked_add(notional), "entry value")?;
            self.net_units = new_net;
            return Ok(RealizedDelta::default());
        }

        let avg = in_range(self.entry_value.checked_div(net), "average price")?;

        let (closed, entry_value) = if units.abs() <= net.abs() {
            // Full or partial close.
            let closed = -units;
            let remaining = if new_net.is_zero() {
                Decimal::ZERO
            } else {
                in_range(
                    closed
                        .checked_mul(avg)
                        .and_then(|v| self.entry_value.checked_sub(v)),
                    "entry value",
                )?
            };
            (closed, remaining)
        } else {
            // Close everything and reverse: the remainder opens at `price`.
            (net, in_range(new_net.checked_mul(price), "entry value")?)
        };
        let pnl = in_range(
            price.checked_sub(avg).and_then(|d| closed.checked_mul(d)),
            "realized P&L",
        )?;

        self.net_units = new_net;
        self.entry_value = entry_value;
        Ok(RealizedDelta {
            closed_units: closed,
            entry_price: avg,
            exit_price: price,
            pnl,
        })
    }
}

fn in_range(value: Option<Decimal>, what: &str) -> Result<Decimal> {
    value.ok_or_else(|| Error::overflow(format!("{what} out of range")))
}

/// Positions for every tracked pair. Positions are never removed; a closed
/// position stays in the book at zero.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: BTreeMap<Pair, Position>,
}

impl PositionBook {
    /// Create a book with a flat position per pair.
    pub fn new(pairs: &[Pair]) -> Self {
        Self {
            positions: pairs.iter().map(|&p| (p, Position::flat(p))).collect(),
        }
    }

    /// Position in `pair` after a fill, without touching the book.
    pub fn preview(&self, pair: Pair, units: Decimal, price: Decimal) -> Result<(Position, RealizedDelta)> {
        let mut next = self
            .positions
            .get(&pair)
            .cloned()
            .ok_or_else(|| Error::invalid_fill(format!("{pair} is not a tracked pair")))?;
        let delta = next.apply(units, price)?;
        Ok((next, delta))
    }

    /// Apply a fill to the position in `pair`.
    pub fn apply(&mut self, pair: Pair, units: Decimal, price: Decimal) -> Result<RealizedDelta> {
        let (next, delta) = self.preview(pair, units, price)?;
        self.commit(next);
        Ok(delta)
    }

    /// Store a position produced by `preview`.
    pub(crate) fn commit(&mut self, position: Position) {
        self.positions.insert(position.pair, position);
    }

    /// Position for a pair.
    pub fn get(&self, pair: Pair) -> Option<&Position> {
        self.positions.get(&pair)
    }

    /// Whether the pair is tracked.
    pub fn contains(&self, pair: Pair) -> bool {
        self.positions.contains_key(&pair)
    }

    /// All positions, ordered by pair.
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Positions with non-zero exposure.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.iter().filter(|p| !p.is_flat())
    }

    /// Number of tracked pairs.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no pairs are tracked.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

//! Portfolio bookkeeping.
//!
//! Translates signals into priced orders, applies fills to the position
//! book, and marks open positions to market in the home currency.
//! Every public operation leaves `equity == balance + unrealized_pnl`.

use fxbt_core::{
    Currency, Error, Fill, FillStatus, Order, OrderType, Pair, PriceCache, QuoteSide, Result,
    Signal, Timestamp,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::position::{Position, PositionBook};

/// Realized trade record, one per fill that closed units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClosedTrade {
    /// Reference of the closing fill.
    pub reference: String,
    pub pair: Pair,
    pub timestamp: Timestamp,
    /// Units closed, signed like the position they came from.
    pub units: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Realized P&L in the pair's quote currency.
    pub pnl: Decimal,
    /// Realized P&L in home currency.
    pub pnl_home: Decimal,
}

/// Read-only view of the ledger handed to reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub timestamp: Timestamp,
    pub balance: Decimal,
    pub unrealized_pnl: Decimal,
    pub equity: Decimal,
    pub positions: Vec<Position>,
}

/// Balance, equity and positions for one backtest, in `home_currency`.
#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    home_currency: Currency,
    initial_equity: Decimal,
    balance: Decimal,
    unrealized_pnl: Decimal,
    equity: Decimal,
    positions: PositionBook,
    trades: Vec<ClosedTrade>,
}

impl PortfolioLedger {
    /// Create a ledger with a flat position for every pair.
    pub fn new(home_currency: Currency, pairs: &[Pair], equity: Decimal) -> Self {
        Self {
            home_currency,
            initial_equity: equity,
            balance: equity,
            unrealized_pnl: Decimal::ZERO,
            equity,
            positions: PositionBook::new(pairs),
            trades: Vec::new(),
        }
    }

    /// Turn a signal into an order with a resolved price.
    ///
    /// Market sells execute at the bid, buys at the ask. Fails with
    /// `MissingPriceData` instead of emitting an unpriced order.
    pub fn translate_signal(&self, signal: &Signal, prices: &PriceCache) -> Result<Order> {
        if !self.positions.contains(signal.pair) {
            return Err(Error::invalid_signal(format!(
                "{} is not a tracked pair",
                signal.pair
            )));
        }

        let price = match signal.order_type {
            OrderType::Market => {
                let side = if signal.units < Decimal::ZERO {
                    QuoteSide::Bid
                } else {
                    QuoteSide::Ask
                };
                prices.price(signal.pair, side)?
            }
            OrderType::Limit => signal.limit_price.ok_or_else(|| {
                Error::invalid_signal(format!(
                    "limit signal {} on {} has no limit price",
                    signal.reference, signal.pair
                ))
            })?,
        };

        Ok(Order {
            reference: signal.reference.clone(),
            pair: signal.pair,
            units: signal.units,
            order_type: signal.order_type,
            timestamp: signal.timestamp,
            price,
        })
    }

    /// Apply a fill: book realized P&L into the balance, then revalue.
    ///
    /// Returns the realized P&L in home currency. The ledger is unchanged
    /// when the fill is rejected or the P&L cannot be converted.
    pub fn apply_fill(&mut self, fill: &Fill, prices: &PriceCache) -> Result<Decimal> {
        if fill.status == FillStatus::Rejected {
            debug!(reference = %fill.reference, pair = %fill.pair, "ignoring rejected fill");
            return Ok(Decimal::ZERO);
        }

        let position = self.positions.get(fill.pair).ok_or_else(|| {
            Error::invalid_fill(format!(
                "fill {} references untracked pair {}",
                fill.reference, fill.pair
            ))
        })?;

        // Resolve the conversion rate before touching the book.
        let rate = if position.closes_with(fill.units) {
            self.home_rate(fill.pair.quote, prices).map_err(|e| {
                warn!(
                    reference = %fill.reference,
                    pair = %fill.pair,
                    "no rate to convert realized P&L into home currency, fill not applied"
                );
                e
            })?
        } else {
            Decimal::ONE
        };

        let (next, delta) = self.positions.preview(fill.pair, fill.units, fill.price)?;
        let pnl_home = delta.pnl.checked_mul(rate).ok_or_else(|| {
            Error::overflow(format!("realized P&L of fill {}", fill.reference))
        })?;
        let balance = self
            .balance
            .checked_add(pnl_home)
            .ok_or_else(|| Error::overflow(format!("balance after fill {}", fill.reference)))?;
        self.positions.commit(next);

        if delta.is_realized() {
            self.balance = balance;
            self.trades.push(ClosedTrade {
                reference: fill.reference.clone(),
                pair: fill.pair,
                timestamp: fill.timestamp,
                units: delta.closed_units,
                entry_price: delta.entry_price,
                exit_price: delta.exit_price,
                pnl: delta.pnl,
                pnl_home,
            });
            debug!(
                pair = %fill.pair,
                units = %delta.closed_units,
                pnl = %delta.pnl,
                pnl_home = %pnl_home,
                "realized"
            );
        }

        self.revalue(prices);
        Ok(pnl_home)
    }

    /// Mark every open position to market and recompute equity.
    ///
    /// Longs are marked at the bid and shorts at the ask. A position whose
    /// price or conversion rate is unknown contributes zero.
    pub fn revalue(&mut self, prices: &PriceCache) {
        let mut unrealized = Decimal::ZERO;
        for position in self.positions.open_positions() {
            let total = self.position_value(position, prices).and_then(|value| {
                unrealized
                    .checked_add(value)
                    .ok_or_else(|| Error::overflow("unrealized P&L total"))
            });
            match total {
                Ok(total) => unrealized = total,
                Err(e) => debug!(pair = %position.pair, error = %e, "skipping revaluation"),
            }
        }
        match self.balance.checked_add(unrealized) {
            Some(equity) => {
                self.unrealized_pnl = unrealized;
                self.equity = equity;
            }
            None => warn!(
                balance = %self.balance,
                unrealized = %unrealized,
                "equity out of range, keeping previous valuation"
            ),
        }
    }

    /// Unrealized P&L of one position in home currency.
    fn position_value(&self, position: &Position, prices: &PriceCache) -> Result<Decimal> {
        let side = if position.is_long() {
            QuoteSide::Bid
        } else {
            QuoteSide::Ask
        };
        let price = prices.price(position.pair, side)?;
        let rate = self.home_rate(position.pair.quote, prices)?;
        position
            .unrealized(price)
            .and_then(|pnl| pnl.checked_mul(rate))
            .ok_or_else(|| Error::overflow(format!("unrealized P&L of {}", position.pair)))
    }

    /// Rate converting one unit of `currency` into the home currency.
    ///
    /// Always the bid of (currency, home), i.e. the reciprocal of the
    /// (home, currency) ask when only that direction was quoted.
    pub fn home_rate(&self, currency: Currency, prices: &PriceCache) -> Result<Decimal> {
        if currency == self.home_currency {
            return Ok(Decimal::ONE);
        }
        let pair = Pair {
            base: currency,
            quote: self.home_currency,
        };
        prices.bid(pair)
    }

    /// Convert a `currency` amount into the home currency.
    pub fn to_home(&self, amount: Decimal, currency: Currency, prices: &PriceCache) -> Result<Decimal> {
        amount
            .checked_mul(self.home_rate(currency, prices)?)
            .ok_or_else(|| Error::overflow(format!("{amount} {currency} in home currency")))
    }

    /// Point-in-time view for reporting.
    pub fn snapshot(&self, timestamp: Timestamp) -> Snapshot {
        Snapshot {
            timestamp,
            balance: self.balance,
            unrealized_pnl: self.unrealized_pnl,
            equity: self.equity,
            positions: self.positions.iter().cloned().collect(),
        }
    }

    pub fn home_currency(&self) -> Currency {
        self.home_currency
    }

    pub fn initial_equity(&self) -> Decimal {
        self.initial_equity
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.unrealized_pnl
    }

    pub fn equity(&self) -> Decimal {
        self.equity
    }

    pub fn positions(&self) -> &PositionBook {
        &self.positions
    }

    /// Realized trades, in fill order.
    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }
}

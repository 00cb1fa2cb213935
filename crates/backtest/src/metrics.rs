//! Equity curve reporting.
//!
//! Collects ledger snapshots into a flat equity curve with drawdowns and
//! writes it out as CSV.

use std::io;

use fxbt_core::{Pair, Result, Timestamp};
use rust_decimal::Decimal;

use crate::ledger::Snapshot;

/// Output sink for ledger snapshots. Never feeds back into the engine.
pub trait ReportSink {
    fn record(&mut self, snapshot: &Snapshot);
}

impl ReportSink for Vec<Snapshot> {
    fn record(&mut self, snapshot: &Snapshot) {
        self.push(snapshot.clone());
    }
}

/// Equity curve point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquityPoint {
    pub timestamp: Timestamp,
    pub balance: Decimal,
    pub equity: Decimal,
    /// Peak equity minus current equity.
    pub drawdown: Decimal,
    /// Drawdown as a percentage of the peak.
    pub drawdown_pct: Decimal,
    /// Net units per pair, in `EquityCurve::pairs` order.
    pub units: Vec<Decimal>,
}

/// Equity curve built from snapshots.
#[derive(Debug, Clone)]
pub struct EquityCurve {
    initial_equity: Decimal,
    peak: Decimal,
    pairs: Vec<Pair>,
    points: Vec<EquityPoint>,
}

impl EquityCurve {
    /// Create an empty curve starting from `initial_equity`.
    pub fn new(initial_equity: Decimal) -> Self {
        Self {
            initial_equity,
            peak: initial_equity,
            pairs: Vec::new(),
            points: Vec::new(),
        }
    }

    /// Recorded points, oldest first.
    pub fn points(&self) -> &[EquityPoint] {
        &self.points
    }

    /// Pair columns, taken from the first snapshot.
    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Largest peak-to-trough equity drop.
    pub fn max_drawdown(&self) -> Decimal {
        self.points
            .iter()
            .map(|p| p.drawdown)
            .max()
            .unwrap_or(Decimal::ZERO)
    }

    /// Largest drawdown as a percentage of its peak.
    pub fn max_drawdown_pct(&self) -> Decimal {
        self.points
            .iter()
            .map(|p| p.drawdown_pct)
            .max()
            .unwrap_or(Decimal::ZERO)
    }

    /// Return of the last recorded equity over the initial equity, in percent.
    pub fn total_return_pct(&self) -> Decimal {
        let last = self
            .points
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_equity);
        ((last - self.initial_equity) * Decimal::ONE_HUNDRED)
            .checked_div(self.initial_equity)
            .unwrap_or(Decimal::ZERO)
    }

    /// Write `timestamp,balance,equity,<pair>...` rows.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec![
            "timestamp".to_string(),
            "balance".to_string(),
            "equity".to_string(),
        ];
        header.extend(self.pairs.iter().map(|p| p.to_string()));
        wtr.write_record(&header)?;

        for point in &self.points {
            let mut row = vec![
                point.timestamp.to_rfc3339(),
                point.balance.to_string(),
                point.equity.to_string(),
            ];
            row.extend(point.units.iter().map(|u| u.to_string()));
            wtr.write_record(&row)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

impl ReportSink for EquityCurve {
    fn record(&mut self, snapshot: &Snapshot) {
        if self.pairs.is_empty() {
            self.pairs = snapshot.positions.iter().map(|p| p.pair).collect();
        }

        self.peak = self.peak.max(snapshot.equity);
        let drawdown = self.peak - snapshot.equity;
        let drawdown_pct = (drawdown * Decimal::ONE_HUNDRED)
            .checked_div(self.peak)
            .unwrap_or(Decimal::ZERO);

        let units = self
            .pairs
            .iter()
            .map(|pair| {
                snapshot
                    .positions
                    .iter()
                    .find(|p| p.pair == *pair)
                    .map(|p| p.net_units)
                    .unwrap_or(Decimal::ZERO)
            })
            .collect();

        self.points.push(EquityPoint {
            timestamp: snapshot.timestamp,
            balance: snapshot.balance,
            equity: snapshot.equity,
            drawdown,
            drawdown_pct,
            units,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn snapshot(minute: u32, balance: Decimal, equity: Decimal, units: Decimal) -> Snapshot {
        let mut position = Position::flat("GBPUSD".parse().unwrap());
        position.net_units = units;
        Snapshot {
            timestamp: Utc.with_ymd_and_hms(2020, 7, 8, 12, minute, 0).unwrap(),
            balance,
            unrealized_pnl: equity - balance,
            equity,
            positions: vec![position],
        }
    }

    #[test]
    fn test_equity_curve() {
        let mut curve = EquityCurve::new(dec!(10000));

        curve.record(&snapshot(0, dec!(10000), dec!(10100), dec!(100)));
        curve.record(&snapshot(1, dec!(10000), dec!(9950), dec!(100))); // Creates drawdown
        curve.record(&snapshot(2, dec!(10200), dec!(10200), dec!(0)));

        assert_eq!(curve.points().len(), 3);
        assert_eq!(curve.points()[1].drawdown, dec!(150));
        assert_eq!(curve.max_drawdown(), dec!(150));
        // 150 below a 10100 peak.
        assert_eq!(curve.max_drawdown_pct(), dec!(15000) / dec!(10100));
        assert_eq!(curve.points()[2].drawdown, Decimal::ZERO);
        assert_eq!(curve.total_return_pct(), dec!(2));
    }

    #[test]
    fn test_empty_curve() {
        let curve = EquityCurve::new(dec!(10000));
        assert_eq!(curve.max_drawdown(), Decimal::ZERO);
        assert_eq!(curve.max_drawdown_pct(), Decimal::ZERO);
        assert_eq!(curve.total_return_pct(), Decimal::ZERO);
    }

    #[test]
    fn test_write_csv() {
        let mut curve = EquityCurve::new(dec!(500));
        curve.record(&snapshot(0, dec!(500), dec!(510.5), dec!(-20)));

        let mut out = Vec::new();
        curve.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("timestamp,balance,equity,GBPUSD"));
        assert_eq!(lines.next(), Some("2020-07-08T12:00:00+00:00,500,510.5,-20"));
        assert_eq!(lines.next(), None);
    }
}

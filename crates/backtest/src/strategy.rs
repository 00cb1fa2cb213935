//! Signal generation interface and a periodic test strategy.

use std::collections::HashMap;

use fxbt_core::{Pair, Signal, Tick};
use rust_decimal::Decimal;

use crate::dispatcher::EventQueue;

/// Turns ticks into trade intents.
pub trait Strategy {
    /// Called for every tick; may push any number of signals.
    fn on_tick(&mut self, tick: &Tick, queue: &mut EventQueue);
}

/// Every `interval` ticks of a pair, alternately buys and sells `units`
/// at market. Useful for exercising the engine end to end.
#[derive(Debug, Clone)]
pub struct PeriodicStrategy {
    interval: u64,
    units: Decimal,
    ticks: HashMap<Pair, u64>,
    long: HashMap<Pair, bool>,
    emitted: u64,
}

impl PeriodicStrategy {
    /// Create a new periodic strategy. An interval of zero is treated as one.
    pub fn new(interval: u64, units: Decimal) -> Self {
        Self {
            interval: interval.max(1),
            units,
            ticks: HashMap::new(),
            long: HashMap::new(),
            emitted: 0,
        }
    }

    /// Number of signals emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl Strategy for PeriodicStrategy {
    fn on_tick(&mut self, tick: &Tick, queue: &mut EventQueue) {
        let count = self.ticks.entry(tick.pair).or_insert(0);
        *count += 1;
        if *count % self.interval != 0 {
            return;
        }

        let long = self.long.entry(tick.pair).or_insert(false);
        let units = if *long { -self.units } else { self.units };
        *long = !*long;

        self.emitted += 1;
        let reference = format!("sig-{}", self.emitted);
        queue.push(Signal::market(reference, tick.pair, units, tick.timestamp));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fxbt_core::Event;
    use rust_decimal_macros::dec;

    fn tick(pair: &str) -> Tick {
        Tick {
            pair: pair.parse().unwrap(),
            timestamp: Utc::now(),
            bid: dec!(1.1),
            ask: dec!(1.2),
        }
    }

    fn drain_units(queue: &mut EventQueue) -> Vec<Decimal> {
        let mut units = Vec::new();
        while let Some(event) = queue.pop() {
            if let Event::Signal(s) = event {
                units.push(s.units);
            }
        }
        units
    }

    #[test]
    fn test_alternates_every_interval() {
        let mut strategy = PeriodicStrategy::new(2, dec!(100));
        let mut queue = EventQueue::new();

        for _ in 0..6 {
            strategy.on_tick(&tick("GBPUSD"), &mut queue);
        }

        assert_eq!(drain_units(&mut queue), [dec!(100), dec!(-100), dec!(100)]);
        assert_eq!(strategy.emitted(), 3);
    }

    #[test]
    fn test_counts_pairs_independently() {
        let mut strategy = PeriodicStrategy::new(2, dec!(1));
        let mut queue = EventQueue::new();

        strategy.on_tick(&tick("GBPUSD"), &mut queue);
        strategy.on_tick(&tick("USDJPY"), &mut queue);
        assert!(queue.is_empty());

        strategy.on_tick(&tick("USDJPY"), &mut queue);
        assert_eq!(queue.len(), 1);
    }
}

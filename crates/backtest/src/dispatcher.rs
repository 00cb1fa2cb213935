//! Event dispatch loop.
//!
//! Pops events from a FIFO queue and routes them: ticks to the price cache,
//! strategy and ledger; signals to the ledger for pricing; orders to the
//! fill simulator; fills back to the ledger. When the queue runs dry one
//! more tick is requested from the tick source.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use fxbt_core::config::BacktestConfig;
use fxbt_core::{Config, Error, Event, Fill, Order, PriceCache, Result, Signal, Tick};
use tracing::{debug, info, warn};

use crate::feed::TickSource;
use crate::fill_model::FillSimulator;
use crate::ledger::PortfolioLedger;
use crate::metrics::{EquityCurve, ReportSink};
use crate::strategy::Strategy;

/// FIFO queue shared by the loop and its producers.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&mut self, event: impl Into<Event>) {
        self.events.push_back(event.into());
    }

    /// Take the oldest event.
    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Loop limits.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum number of loop iterations.
    pub max_iters: u64,
    /// Pause after every iteration; zero for a pure backtest.
    pub heartbeat: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_iters: 100_000_000,
            heartbeat: Duration::ZERO,
        }
    }
}

impl From<&BacktestConfig> for DispatcherConfig {
    fn from(config: &BacktestConfig) -> Self {
        Self {
            max_iters: config.max_iters,
            heartbeat: Duration::from_millis(config.heartbeat_ms),
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub ticks: u64,
    pub signals: u64,
    pub orders: u64,
    pub fills: u64,
    /// Signals that produced no order.
    pub skipped_signals: u64,
    /// Fills the ledger refused.
    pub rejected_fills: u64,
    /// Ticks dropped for carrying an invalid quote.
    pub invalid_ticks: u64,
}

/// Single-threaded backtest loop over one ledger.
pub struct Dispatcher<T, S, X> {
    config: DispatcherConfig,
    queue: EventQueue,
    prices: PriceCache,
    ledger: PortfolioLedger,
    tick_source: T,
    strategy: S,
    execution: X,
    summary: RunSummary,
}

impl<T, S, X> Dispatcher<T, S, X>
where
    T: TickSource,
    S: Strategy,
    X: FillSimulator,
{
    /// Create a dispatcher around an existing ledger and price cache.
    pub fn new(
        config: DispatcherConfig,
        ledger: PortfolioLedger,
        prices: PriceCache,
        tick_source: T,
        strategy: S,
        execution: X,
    ) -> Self {
        Self {
            config,
            queue: EventQueue::new(),
            prices,
            ledger,
            tick_source,
            strategy,
            execution,
            summary: RunSummary::default(),
        }
    }

    /// Build the price cache and ledger from a validated configuration.
    pub fn from_config(config: &Config, tick_source: T, strategy: S, execution: X) -> Result<Self> {
        config.validate()?;
        let bt = &config.backtest;
        Ok(Self::new(
            DispatcherConfig::from(bt),
            PortfolioLedger::new(bt.home_currency, &bt.pairs, bt.initial_equity),
            PriceCache::new(&bt.pairs),
            tick_source,
            strategy,
            execution,
        ))
    }

    /// Run until the tick source is exhausted and the queue drained, or the
    /// iteration budget is spent.
    pub fn run(&mut self, sink: &mut dyn ReportSink) -> Result<RunSummary> {
        info!(
            home = %self.ledger.home_currency(),
            initial_equity = %self.ledger.initial_equity(),
            equity = %self.ledger.equity(),
            max_iters = self.config.max_iters,
            "running backtest"
        );

        while self.summary.iterations < self.config.max_iters {
            if !self.step(sink)? {
                break;
            }
            if !self.config.heartbeat.is_zero() {
                std::thread::sleep(self.config.heartbeat);
            }
        }

        let s = self.summary;
        info!(
            iterations = s.iterations,
            ticks = s.ticks,
            fills = s.fills,
            skipped_signals = s.skipped_signals,
            rejected_fills = s.rejected_fills,
            balance = %self.ledger.balance(),
            equity = %self.ledger.equity(),
            "backtest complete"
        );
        Ok(s)
    }

    /// Run to completion into `curve`, then write the curve as CSV to `out`.
    pub fn simulate<W: io::Write>(&mut self, curve: &mut EquityCurve, out: W) -> Result<RunSummary> {
        let summary = self.run(curve)?;
        info!(
            total_return_pct = %curve.total_return_pct(),
            max_drawdown = %curve.max_drawdown(),
            max_drawdown_pct = %curve.max_drawdown_pct(),
            trades = self.ledger.trades().len(),
            "performance"
        );
        curve.write_csv(out)?;
        Ok(summary)
    }

    /// One loop iteration. Returns `false` once there is nothing left to do.
    pub fn step(&mut self, sink: &mut dyn ReportSink) -> Result<bool> {
        match self.queue.pop() {
            Some(event) => self.route(event, sink)?,
            None if self.tick_source.has_more() => {
                self.tick_source.push_next_tick(&mut self.queue)?;
            }
            None => return Ok(false),
        }
        self.summary.iterations += 1;
        Ok(true)
    }

    fn route(&mut self, event: Event, sink: &mut dyn ReportSink) -> Result<()> {
        debug!(
            kind = event.kind(),
            pair = %event.pair(),
            at = %event.timestamp(),
            "dispatch"
        );
        match event {
            Event::Tick(tick) => self.on_tick(tick, sink),
            Event::Signal(signal) => self.on_signal(signal),
            Event::Order(order) => self.on_order(order),
            Event::Fill(fill) => self.on_fill(fill, sink),
        }
    }

    fn on_tick(&mut self, tick: Tick, sink: &mut dyn ReportSink) -> Result<()> {
        self.summary.ticks += 1;
        let updated = self
            .prices
            .update(tick.pair, Some(tick.bid), Some(tick.ask), tick.timestamp);
        if let Err(e) = recoverable(updated)? {
            warn!(pair = %tick.pair, error = %e, "dropping tick");
            self.summary.invalid_ticks += 1;
            return Ok(());
        }

        self.strategy.on_tick(&tick, &mut self.queue);
        self.ledger.revalue(&self.prices);
        sink.record(&self.ledger.snapshot(tick.timestamp));
        Ok(())
    }

    fn on_signal(&mut self, signal: Signal) -> Result<()> {
        self.summary.signals += 1;
        match recoverable(self.ledger.translate_signal(&signal, &self.prices))? {
            Ok(order) => self.queue.push(order),
            Err(e @ Error::MissingPriceData { .. }) => {
                warn!(
                    reference = %signal.reference,
                    pair = %signal.pair,
                    error = %e,
                    "Unable to execute order as price data was insufficient."
                );
                self.summary.skipped_signals += 1;
            }
            Err(e) => {
                warn!(reference = %signal.reference, error = %e, "signal skipped");
                self.summary.skipped_signals += 1;
            }
        }
        Ok(())
    }

    fn on_order(&mut self, order: Order) -> Result<()> {
        self.summary.orders += 1;
        info!(
            reference = %order.reference,
            pair = %order.pair,
            units = %order.units,
            price = %order.price,
            "executing order"
        );
        let fill = self.execution.execute(&order);
        self.queue.push(fill);
        Ok(())
    }

    fn on_fill(&mut self, fill: Fill, sink: &mut dyn ReportSink) -> Result<()> {
        self.summary.fills += 1;
        info!(
            reference = %fill.reference,
            pair = %fill.pair,
            units = %fill.units,
            price = %fill.price,
            status = ?fill.status,
            "fill"
        );
        match recoverable(self.ledger.apply_fill(&fill, &self.prices))? {
            Ok(_) => sink.record(&self.ledger.snapshot(fill.timestamp)),
            Err(e) => {
                warn!(reference = %fill.reference, error = %e, "fill rejected");
                self.summary.rejected_fills += 1;
            }
        }
        Ok(())
    }

    /// Queue for injecting events ahead of the next iteration.
    pub fn queue_mut(&mut self) -> &mut EventQueue {
        &mut self.queue
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn prices(&self) -> &PriceCache {
        &self.prices
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }
}

/// Split recoverable errors (returned as `Ok(Err(_))`) from fatal ones.
fn recoverable<V>(result: Result<V>) -> Result<std::result::Result<V, Error>> {
    match result {
        Ok(v) => Ok(Ok(v)),
        Err(e) if e.is_recoverable() => Ok(Err(e)),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ReplayTickSource;
    use crate::fill_model::SimulatedExecution;
    use crate::ledger::Snapshot;
    use crate::strategy::PeriodicStrategy;
    use chrono::{TimeZone, Utc};
    use fxbt_core::{FillStatus, Pair, Timestamp};
    use std::time::Instant;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn pair(s: &str) -> Pair {
        s.parse().unwrap()
    }

    fn ts(secs: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2020, 7, 8, 12, 0, secs).unwrap()
    }

    fn tick(p: &str, secs: u32, bid: Decimal, ask: Decimal) -> Tick {
        Tick {
            pair: pair(p),
            timestamp: ts(secs),
            bid,
            ask,
        }
    }

    /// Records every tick it sees without trading.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<Tick>,
    }

    impl Strategy for Recorder {
        fn on_tick(&mut self, tick: &Tick, _queue: &mut EventQueue) {
            self.seen.push(tick.clone());
        }
    }

    fn dispatcher<S: Strategy>(
        ticks: Vec<Tick>,
        strategy: S,
    ) -> Dispatcher<ReplayTickSource, S, SimulatedExecution> {
        let pairs = [pair("GBPUSD"), pair("USDJPY")];
        Dispatcher::new(
            DispatcherConfig::default(),
            PortfolioLedger::new("JPY".parse().unwrap(), &pairs, dec!(10000)),
            PriceCache::new(&pairs),
            ReplayTickSource::new(ticks),
            strategy,
            SimulatedExecution::default(),
        )
    }

    #[test]
    fn test_config_from_backtest_section() {
        let mut section = BacktestConfig::default();
        section.max_iters = 42;
        section.heartbeat_ms = 250;

        let config = DispatcherConfig::from(&section);
        assert_eq!(config.max_iters, 42);
        assert_eq!(config.heartbeat, Duration::from_millis(250));
        assert!(DispatcherConfig::default().heartbeat.is_zero());
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut queue = EventQueue::new();
        queue.push(tick("GBPUSD", 1, dec!(1.2), dec!(1.3)));
        queue.push(Signal::market("s", pair("GBPUSD"), dec!(1), ts(2)));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().map(|e| e.kind()), Some("tick"));
        assert_eq!(queue.pop().map(|e| e.kind()), Some("signal"));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_ticks_update_prices_and_reach_strategy() {
        let ticks = vec![
            tick("USDJPY", 0, dec!(105.774), dec!(110.863)),
            tick("GBPUSD", 1, dec!(1.30328), dec!(1.50349)),
        ];
        let mut d = dispatcher(ticks, Recorder::default());
        let mut snapshots: Vec<Snapshot> = Vec::new();

        let summary = d.run(&mut snapshots).unwrap();

        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.iterations, 4);
        assert_eq!(d.strategy().seen.len(), 2);
        assert_eq!(snapshots.len(), 2);
        assert_eq!(d.prices().bid(pair("JPYUSD")).unwrap(), Decimal::ONE / dec!(110.863));
        assert_eq!(d.ledger().equity(), dec!(10000));
    }

    #[test]
    fn test_signal_order_fill_flow() {
        let ticks = vec![
            tick("USDJPY", 0, dec!(105.774), dec!(110.863)),
            tick("GBPUSD", 1, dec!(1.30328), dec!(1.50349)),
            tick("GBPUSD", 2, dec!(1.30328), dec!(1.50349)),
        ];
        // Trades on every second GBPUSD tick.
        let mut d = dispatcher(ticks, PeriodicStrategy::new(2, dec!(100)));
        let mut snapshots: Vec<Snapshot> = Vec::new();

        let summary = d.run(&mut snapshots).unwrap();

        assert_eq!(summary.signals, 1);
        assert_eq!(summary.orders, 1);
        assert_eq!(summary.fills, 1);
        let position = d.ledger().positions().get(pair("GBPUSD")).unwrap();
        assert_eq!(position.net_units, dec!(100));
        assert_eq!(position.average_price(), Some(dec!(1.50349)));

        // Long 100 bought at the ask, marked at the bid, in JPY.
        let expected_upl = (dec!(1.30328) - dec!(1.50349)) * dec!(100) * dec!(105.774);
        assert_eq!(d.ledger().unrealized_pnl(), expected_upl);
        assert_eq!(d.ledger().equity(), dec!(10000) + expected_upl);
        // Last snapshot is the one taken right after the fill.
        assert_eq!(snapshots.last().unwrap().equity, d.ledger().equity());
    }

    #[test]
    fn test_signal_is_processed_after_its_tick() {
        let mut d = dispatcher(Vec::new(), Recorder::default());
        let mut sink: Vec<Snapshot> = Vec::new();

        // Signal queued behind the tick that prices it.
        d.queue_mut().push(tick("GBPUSD", 0, dec!(1.2), dec!(1.25)));
        d.queue_mut().push(Signal::market("s1", pair("GBPUSD"), dec!(-10), ts(0)));
        d.run(&mut sink).unwrap();

        let trade_units = d.ledger().positions().get(pair("GBPUSD")).unwrap().net_units;
        assert_eq!(trade_units, dec!(-10));
        assert_eq!(d.summary().skipped_signals, 0);
    }

    #[test]
    fn test_missing_price_signal_skipped() {
        let mut d = dispatcher(Vec::new(), Recorder::default());
        let mut sink: Vec<Snapshot> = Vec::new();

        d.queue_mut().push(Signal::market("s1", pair("GBPUSD"), dec!(10), ts(0)));
        let summary = d.run(&mut sink).unwrap();

        assert_eq!(summary.skipped_signals, 1);
        assert_eq!(summary.orders, 0);
        assert_eq!(d.ledger().equity(), dec!(10000));
        assert!(d.ledger().positions().get(pair("GBPUSD")).unwrap().is_flat());
    }

    #[test]
    fn test_untracked_fill_rejected_and_loop_continues() {
        let ticks = vec![tick("GBPUSD", 1, dec!(1.2), dec!(1.25))];
        let mut d = dispatcher(ticks, Recorder::default());
        let mut sink: Vec<Snapshot> = Vec::new();

        d.queue_mut().push(Fill {
            reference: "f1".to_string(),
            pair: pair("EURCHF"),
            units: dec!(5),
            price: dec!(1.07),
            status: FillStatus::Filled,
            timestamp: ts(0),
        });
        let summary = d.run(&mut sink).unwrap();

        assert_eq!(summary.rejected_fills, 1);
        assert_eq!(summary.ticks, 1);
        assert_eq!(d.ledger().equity(), dec!(10000));
    }

    #[test]
    fn test_crossed_tick_dropped() {
        let ticks = vec![tick("GBPUSD", 1, dec!(1.3), dec!(1.2))];
        let mut d = dispatcher(ticks, Recorder::default());
        let mut sink: Vec<Snapshot> = Vec::new();

        let summary = d.run(&mut sink).unwrap();
        assert_eq!(summary.invalid_ticks, 1);
        assert!(d.strategy().seen.is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_limit_order_passes_through() {
        let mut d = dispatcher(Vec::new(), Recorder::default());
        let mut sink: Vec<Snapshot> = Vec::new();

        d.queue_mut()
            .push(Signal::limit("l1", pair("USDJPY"), dec!(2), dec!(107), ts(0)));
        d.run(&mut sink).unwrap();

        let position = d.ledger().positions().get(pair("USDJPY")).unwrap();
        assert_eq!(position.entry_value, dec!(214));
        assert_eq!(d.summary().orders, 1);
    }

    #[test]
    fn test_iteration_budget() {
        let ticks = (0..10)
            .map(|i| tick("GBPUSD", i, dec!(1.2), dec!(1.25)))
            .collect();
        let mut d = dispatcher(ticks, Recorder::default());
        d.config.max_iters = 5;
        let mut sink: Vec<Snapshot> = Vec::new();

        let summary = d.run(&mut sink).unwrap();
        assert_eq!(summary.iterations, 5);
        // Pull, route, pull, route, pull.
        assert_eq!(summary.ticks, 2);
    }

    #[test]
    fn test_heartbeat_throttles_without_changing_result() {
        let ticks = || {
            vec![
                tick("USDJPY", 0, dec!(105.774), dec!(110.863)),
                tick("GBPUSD", 1, dec!(1.30328), dec!(1.50349)),
                tick("GBPUSD", 2, dec!(1.30328), dec!(1.50349)),
            ]
        };

        let mut plain = dispatcher(ticks(), PeriodicStrategy::new(2, dec!(100)));
        let expected = plain.run(&mut Vec::<Snapshot>::new()).unwrap();

        let mut throttled = dispatcher(ticks(), PeriodicStrategy::new(2, dec!(100)));
        throttled.config.heartbeat = Duration::from_millis(1);
        let started = Instant::now();
        let summary = throttled.run(&mut Vec::<Snapshot>::new()).unwrap();

        assert_eq!(summary, expected);
        assert_eq!(throttled.ledger().equity(), plain.ledger().equity());
        assert!(started.elapsed() >= Duration::from_millis(summary.iterations));
    }

    #[test]
    fn test_simulate_writes_curve() {
        let ticks = vec![tick("USDJPY", 0, dec!(105.774), dec!(110.863))];
        let mut d = dispatcher(ticks, Recorder::default());
        let mut curve = EquityCurve::new(dec!(10000));
        let mut out: Vec<u8> = Vec::new();

        let summary = d.simulate(&mut curve, &mut out).unwrap();

        assert_eq!(summary.ticks, 1);
        assert_eq!(curve.points().len(), 1);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "timestamp,balance,equity,GBPUSD,USDJPY\n2020-07-08T12:00:00+00:00,10000,10000,0,0\n"
        );
    }
}

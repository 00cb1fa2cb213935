//! Backtesting engine for FX pairs.
//!
//! This crate provides:
//! - Position bookkeeping with weighted-average entries
//! - The portfolio ledger (signal pricing, fills, mark-to-market in home currency)
//! - The event dispatch loop and its collaborator interfaces
//! - Simulated execution, tick replay and equity curve reporting

pub mod dispatcher;
pub mod feed;
pub mod fill_model;
pub mod ledger;
pub mod metrics;
pub mod position;
pub mod strategy;

pub use dispatcher::{Dispatcher, DispatcherConfig, EventQueue, RunSummary};
pub use feed::{ReplayTickSource, TickSource};
pub use fill_model::{FillModelConfig, FillSimulator, SimulatedExecution};
pub use ledger::{ClosedTrade, PortfolioLedger, Snapshot};
pub use metrics::{EquityCurve, EquityPoint, ReportSink};
pub use position::{Position, PositionBook, RealizedDelta};
pub use strategy::{PeriodicStrategy, Strategy};

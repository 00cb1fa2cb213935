//! Historical tick replay.

use std::collections::VecDeque;

use fxbt_core::{Result, Tick};

use crate::dispatcher::EventQueue;

/// Source of market ticks driving the event loop.
pub trait TickSource {
    /// Whether more ticks remain.
    fn has_more(&self) -> bool;

    /// Enqueue exactly one tick (plus any follow-on events) when data remains.
    fn push_next_tick(&mut self, queue: &mut EventQueue) -> Result<()>;
}

/// In-memory ticks for one or more pairs, replayed in timestamp order.
#[derive(Debug, Clone, Default)]
pub struct ReplayTickSource {
    ticks: VecDeque<Tick>,
}

impl ReplayTickSource {
    /// Merge ticks by timestamp; ties keep their input order.
    pub fn new(ticks: impl IntoIterator<Item = Tick>) -> Self {
        let mut ticks: Vec<Tick> = ticks.into_iter().collect();
        ticks.sort_by_key(|t| t.timestamp);
        Self {
            ticks: ticks.into(),
        }
    }

    /// Ticks not yet replayed.
    pub fn remaining(&self) -> usize {
        self.ticks.len()
    }
}

impl TickSource for ReplayTickSource {
    fn has_more(&self) -> bool {
        !self.ticks.is_empty()
    }

    fn push_next_tick(&mut self, queue: &mut EventQueue) -> Result<()> {
        if let Some(tick) = self.ticks.pop_front() {
            queue.push(tick);
        }
        Ok(())
    }
}

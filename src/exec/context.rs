//! The handle an operator sees while it runs.
//!
//! The context borrows the scheduler for pushes, the worker's statistics
//! shard, and the run-wide control flags. It owns nothing; a fresh handle is
//! materialized per worker per run, so there is no cyclic ownership between
//! scheduler and context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::exec::quiesce::Quiesce;
use crate::exec::stats::ThreadStats;
use crate::sched::{Item, Worklist};

/// A per-worker stopwatch measuring stopwatch units (microseconds) between
/// samples. Operators charge elapsed time to good or wasted work.
pub struct Stopwatch {
    last: Instant,
}

impl Stopwatch {
    fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Microseconds since the previous lap, resetting the origin.
    pub fn lap_us(&mut self) -> u64 {
        let now = Instant::now();
        let us = now.duration_since(self.last).as_micros() as u64;
        self.last = now;
        us
    }
}

/// Operator-facing handle: push, break, stopwatch, statistics.
pub struct Context<'a, W: Worklist> {
    wl: &'a W,
    tid: usize,
    stats: &'a mut ThreadStats,
    stop: &'a AtomicBool,
    quiesce: &'a Quiesce,
    watch: Stopwatch,
    saw_empty: bool,
}

impl<'a, W: Worklist> Context<'a, W> {
    pub(crate) fn new(
        wl: &'a W,
        tid: usize,
        stats: &'a mut ThreadStats,
        stop: &'a AtomicBool,
        quiesce: &'a Quiesce,
    ) -> Self {
        Self {
            wl,
            tid,
            stats,
            stop,
            quiesce,
            watch: Stopwatch::new(),
            saw_empty: false,
        }
    }

    /// Worker id of this context.
    #[inline]
    pub fn tid(&self) -> usize {
        self.tid
    }

    /// Pushes a new item into the scheduler.
    ///
    /// The epoch bump happens before this worker could possibly report
    /// itself quiet again, which is what keeps termination detection sound.
    #[inline]
    pub fn push(&mut self, item: Item) {
        self.stats.pushes += 1;
        self.wl.push(self.tid, item);
        self.quiesce.bump();
    }

    /// Requests cooperative termination: workers drain and exit.
    #[inline]
    pub fn request_break(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// The worker's statistics shard.
    #[inline]
    pub fn stats(&mut self) -> &mut ThreadStats {
        self.stats
    }

    /// Stopwatch lap, in microseconds.
    #[inline]
    pub fn lap_us(&mut self) -> u64 {
        self.watch.lap_us()
    }

    /// Marks the current item stale. The driver forwards this to the
    /// scheduler for adaptive retuning.
    #[inline]
    pub fn mark_empty(&mut self) {
        self.saw_empty = true;
    }

    /// Clears and returns the stale marker. Driver-side.
    #[inline]
    pub(crate) fn take_empty(&mut self) -> bool {
        std::mem::take(&mut self.saw_empty)
    }
}

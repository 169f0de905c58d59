//! Termination detection.
//!
//! Quiescence is the global state where no thread holds work and none is in
//! flight. Detection uses a global epoch counter plus one quiet flag per
//! worker: a thread whose pop came up empty raises its flag and then watches
//! for either new work (a retry pop succeeds) or global agreement. Every
//! push bumps the epoch *before* the pushing thread could possibly raise its
//! own flag again, which invalidates any all-quiet observation that raced
//! with the push.
//!
//! The all-quiet check is two-phase: flags and epoch are read, re-read, and
//! only a doubly-stable observation terminates the run. Safety additionally
//! relies on the scheduler contract that a `None` pop performed a full scan,
//! so work can never sit unreachable while every flag is raised.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use crate::sched::Item;

/// Shared termination-detection state for one run.
pub struct Quiesce {
    epoch: AtomicU64,
    quiet: Box<[CachePadded<AtomicBool>]>,
}

impl Quiesce {
    /// Creates state for `threads` workers, all initially active.
    pub fn new(threads: usize) -> Self {
        Self {
            epoch: AtomicU64::new(0),
            quiet: (0..threads)
                .map(|_| CachePadded::new(AtomicBool::new(false)))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
        }
    }

    /// Records that new work entered the system.
    #[inline]
    pub fn bump(&self) {
        self.epoch.fetch_add(1, Ordering::Release);
    }

    fn all_quiet(&self) -> bool {
        self.quiet.iter().all(|f| f.load(Ordering::Acquire))
    }

    fn all_quiet_stable(&self) -> bool {
        let e0 = self.epoch.load(Ordering::Acquire);
        if !self.all_quiet() {
            return false;
        }
        if self.epoch.load(Ordering::Acquire) != e0 {
            return false;
        }
        if !self.all_quiet() {
            return false;
        }
        self.epoch.load(Ordering::Acquire) == e0
    }

    /// Parks worker `tid` after an empty pop.
    ///
    /// Returns `Some(item)` when a retry found work again (the worker goes
    /// back to its loop), or `None` when the run is over: either the system
    /// is globally quiescent or `stop` was raised.
    pub fn idle(
        &self,
        tid: usize,
        stop: &AtomicBool,
        mut retry: impl FnMut() -> Option<Item>,
    ) -> Option<Item> {
        self.quiet[tid].store(true, Ordering::Release);
        let mut spins = 0u32;
        loop {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            if self.all_quiet_stable() {
                return None;
            }
            if let Some(item) = retry() {
                self.quiet[tid].store(false, Ordering::Release);
                return Some(item);
            }
            spins += 1;
            if spins % 64 == 0 {
                std::thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }
    }
}

//! Ordered-by-integer-metric scheduling (OBIM).
//!
//! Items are mapped to integer buckets (`key >> delta`) and each bucket
//! holds a chunked [`Bag`]. Threads mine the lowest bucket they can see:
//! within a bucket order is free, across buckets the scheduler makes a
//! best-effort, *relaxed* attempt to go lowest-first. A shared global-min
//! hint is CAS-lowered by pushes so that threads working high in the key
//! space notice newly arrived urgent work.
//!
//! The adaptive mode retunes the delta shift at runtime from the stale-item
//! ratio the driver reports back: too much wasted work means the buckets
//! are too wide (halve the delta), nearly none means the order is tighter
//! than it needs to be (double it). A new delta only affects future pushes;
//! items already queued are never re-bucketed.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::exec::per_thread::PerThread;
use crate::sched::chunk::Bag;
use crate::sched::{Item, Worklist};

/// Adaptive window length, in counted dequeues.
const ADAPT_WINDOW: u32 = 4096;
/// Stale ratio above which the bucket width is halved.
const ADAPT_UPPER: f32 = 0.5;
/// Stale ratio below which the bucket width is doubled.
const ADAPT_LOWER: f32 = 0.05;
/// Bounds for the adapted delta shift.
const DELTA_MIN: u32 = 1;
const DELTA_MAX: u32 = 20;

/// Sentinel for "no cursor yet".
const NO_BUCKET: u64 = u64::MAX;

struct ObimTls<const CHUNK: usize> {
    /// Bucket currently being mined.
    cursor: u64,
    /// Bucket id -> bag, filled lazily to keep pushes off the directory lock.
    cache: HashMap<u64, Arc<Bag<CHUNK>>>,
    /// Adaptive window counters.
    window_pops: u32,
    window_empty: u32,
}

/// The OBIM scheduler. `CHUNK` is the bag chunk capacity.
pub struct Obim<const CHUNK: usize> {
    threads: usize,
    adaptive: bool,
    delta: AtomicU32,
    /// Bucket directory. Buckets are created on first push and never removed
    /// while the run lives, so cached `Arc`s stay valid.
    buckets: RwLock<BTreeMap<u64, Arc<Bag<CHUNK>>>>,
    /// Lowest bucket that may hold work. Only lowered by pushes; scans may
    /// raise it opportunistically when they prove a prefix empty.
    min_hint: AtomicU64,
    tls: PerThread<ObimTls<CHUNK>>,
}

impl<const CHUNK: usize> Obim<CHUNK> {
    /// Creates an OBIM instance for `threads` workers.
    pub fn new(threads: usize, delta: u32, adaptive: bool) -> Self {
        Self {
            threads,
            adaptive,
            delta: AtomicU32::new(delta),
            buckets: RwLock::new(BTreeMap::new()),
            min_hint: AtomicU64::new(NO_BUCKET),
            tls: PerThread::new(threads, |_| ObimTls {
                cursor: NO_BUCKET,
                cache: HashMap::new(),
                window_pops: 0,
                window_empty: 0,
            }),
        }
    }

    /// Current delta shift.
    pub fn delta(&self) -> u32 {
        self.delta.load(Ordering::Relaxed)
    }

    fn bag_for(&self, tls: &mut ObimTls<CHUNK>, bucket: u64) -> Arc<Bag<CHUNK>> {
        if let Some(bag) = tls.cache.get(&bucket) {
            return Arc::clone(bag);
        }
        let existing = {
            let dir = self.buckets.read().unwrap();
            dir.get(&bucket).cloned()
        };
        let bag = existing.unwrap_or_else(|| {
            let mut dir = self.buckets.write().unwrap();
            Arc::clone(
                dir.entry(bucket)
                    .or_insert_with(|| Arc::new(Bag::new(self.threads))),
            )
        });
        tls.cache.insert(bucket, Arc::clone(&bag));
        bag
    }

    fn lower_hint(&self, bucket: u64) {
        let mut hint = self.min_hint.load(Ordering::Relaxed);
        while bucket < hint {
            match self.min_hint.compare_exchange_weak(
                hint,
                bucket,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(seen) => hint = seen,
            }
        }
    }

    /// Scans buckets from `start` upward, popping the first item found.
    ///
    /// `observed_hint` is the hint value the scan is based on; when the scan
    /// proves every bucket below the hit empty it tries once to raise the
    /// hint from exactly that observation, so a concurrent lowering (which
    /// means a lower push happened meanwhile) always wins.
    fn scan_from(
        &self,
        tid: usize,
        tls: &mut ObimTls<CHUNK>,
        start: u64,
        observed_hint: u64,
    ) -> Option<Item> {
        let dir = self.buckets.read().unwrap();
        for (&bucket, bag) in dir.range(start..) {
            if let Some(item) = bag.pop_any(tid) {
                tls.cursor = bucket;
                if !tls.cache.contains_key(&bucket) {
                    tls.cache.insert(bucket, Arc::clone(bag));
                }
                if observed_hint < bucket {
                    let _ = self.min_hint.compare_exchange(
                        observed_hint,
                        bucket,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    );
                }
                return Some(item);
            }
        }
        None
    }

    fn maybe_adapt(&self, tls: &mut ObimTls<CHUNK>) {
        if !self.adaptive {
            return;
        }
        if tls.window_pops < ADAPT_WINDOW {
            return;
        }
        let ratio = tls.window_empty as f32 / tls.window_pops as f32;
        let cur = self.delta.load(Ordering::Relaxed);
        if ratio > ADAPT_UPPER {
            let next = (cur / 2).max(DELTA_MIN);
            if next != cur {
                self.delta.store(next, Ordering::Relaxed);
            }
        } else if ratio < ADAPT_LOWER {
            let next = (cur.max(DELTA_MIN) * 2).min(DELTA_MAX);
            if next != cur {
                self.delta.store(next, Ordering::Relaxed);
            }
        }
        tls.window_pops = 0;
        tls.window_empty = 0;
    }
}

impl<const CHUNK: usize> Worklist for Obim<CHUNK> {
    fn push(&self, tid: usize, item: Item) {
        // SAFETY: slot `tid` belongs to the calling worker.
        let tls = unsafe { self.tls.get(tid) };
        let delta = self.delta.load(Ordering::Relaxed);
        let bucket = item.bucket(delta);
        self.bag_for(tls, bucket).push_local(tid, item);
        self.lower_hint(bucket);
        if bucket < tls.cursor {
            tls.cursor = bucket;
        }
    }

    fn pop(&self, tid: usize) -> Option<Item> {
        // SAFETY: slot `tid` belongs to the calling worker.
        let tls = unsafe { self.tls.get(tid) };

        // Fast path: the bucket we were already mining.
        if tls.cursor != NO_BUCKET {
            if let Some(bag) = tls.cache.get(&tls.cursor) {
                let bag = Arc::clone(bag);
                if let Some(item) = bag.pop_any(tid) {
                    tls.window_pops += 1;
                    self.maybe_adapt(tls);
                    return Some(item);
                }
            }
        }

        // The cursor bucket is (transiently) dry: rescan. A remote push may
        // have created work below the cursor, so start at the hint if it is
        // lower.
        let hint = self.min_hint.load(Ordering::Relaxed);
        let start = hint.min(tls.cursor);
        let mut found = self.scan_from(tid, tls, start, hint);
        if found.is_none() && start > 0 {
            // Final full scan; required before reporting emptiness.
            found = self.scan_from(tid, tls, 0, hint);
        }
        if found.is_some() {
            tls.window_pops += 1;
            self.maybe_adapt(tls);
        }
        found
    }

    fn note_empty(&self, tid: usize) {
        if !self.adaptive {
            return;
        }
        // SAFETY: slot `tid` belongs to the calling worker.
        let tls = unsafe { self.tls.get(tid) };
        tls.window_empty += 1;
    }
}

//! Shared relaxed priority queues.
//!
//! These engines keep all work in globally shared structures, trading the
//! locality of OBIM-style per-thread bags for a tighter (sometimes exact)
//! global order. They satisfy the same [`Worklist`] contract and differ only
//! in the looseness-vs-contention trade-off:
//!
//! - [`ExactPq`] pops the global minimum every time (the `skiplist`/`pq`
//!   names). Exact order, every operation contends on one queue.
//! - [`SprayPq`] pops a random element among the smallest `O(p log p)`,
//!   which spreads threads over the head of the queue.
//! - [`MultiQueue`] keeps `c` queues per thread; pop inspects two random
//!   queues and takes the better top.
//! - [`AdaptiveMultiQueue`] is a MultiQueue whose active queue count grows
//!   on push contention and shrinks on empty pops.
//! - [`KLsm`] buffers up to `k` items per thread and spills them as sorted
//!   runs, merged geometrically; the local buffer is the relaxation source.
//! - [`SwarmPq`] amortizes a shared heap behind per-thread pop (and
//!   optionally push) batches.
//!
//! The shared cores are coarsely locked rather than lock-free; the
//! relaxation *semantics* are what the operator loop depends on, and
//! contention behavior is a quality of implementation concern.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam_utils::CachePadded;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::exec::per_thread::PerThread;
use crate::sched::heap::DAryHeap;
use crate::sched::{Item, Prob, Worklist};

fn rng_for(tid: usize) -> SmallRng {
    SmallRng::seed_from_u64(0x9e37_79b9_7f4a_7c15_u64 ^ ((tid as u64) << 32))
}

/// One shared queue with exact pop order.
pub struct ExactPq {
    heap: Mutex<DAryHeap<4>>,
}

impl ExactPq {
    /// Creates the queue. The thread count does not matter here but keeps
    /// the constructor signature uniform across engines.
    pub fn new(_threads: usize) -> Self {
        Self {
            heap: Mutex::new(DAryHeap::new()),
        }
    }
}

impl Worklist for ExactPq {
    fn push(&self, _tid: usize, item: Item) {
        self.heap.lock().unwrap().push(item);
    }

    fn pop(&self, _tid: usize) -> Option<Item> {
        self.heap.lock().unwrap().pop()
    }
}

struct SprayCore {
    map: BTreeMap<Item, u32>,
    len: usize,
}

/// A shared queue whose pop sprays among the smallest items.
pub struct SprayPq {
    core: Mutex<SprayCore>,
    tls: PerThread<SmallRng>,
    width: usize,
}

impl SprayPq {
    /// Creates the queue for `threads` workers. The spray width is
    /// `p * (log2 p + 1)`.
    pub fn new(threads: usize) -> Self {
        let p = threads.max(1);
        let log = usize::BITS - p.leading_zeros() as u32;
        Self {
            core: Mutex::new(SprayCore {
                map: BTreeMap::new(),
                len: 0,
            }),
            tls: PerThread::new(threads, rng_for),
            width: p * log as usize,
        }
    }
}

impl Worklist for SprayPq {
    fn push(&self, _tid: usize, item: Item) {
        let mut core = self.core.lock().unwrap();
        *core.map.entry(item).or_insert(0) += 1;
        core.len += 1;
    }

    fn pop(&self, tid: usize) -> Option<Item> {
        // SAFETY: slot `tid` belongs to the calling worker.
        let rng = unsafe { self.tls.get(tid) };
        let mut core = self.core.lock().unwrap();
        if core.len == 0 {
            return None;
        }
        // Duplicates share one map entry, so the reach is bounded by the
        // number of distinct items.
        let reach = self.width.min(core.map.len());
        let target = rng.random_range(0..reach);
        let item = *core
            .map
            .keys()
            .nth(target)
            .expect("spray index within the populated prefix");
        match core.map.get_mut(&item) {
            Some(count) if *count > 1 => *count -= 1,
            _ => {
                core.map.remove(&item);
            }
        }
        core.len -= 1;
        Some(item)
    }
}

/// `c` queues per thread; pop takes the better of two random tops.
pub struct MultiQueue<const D: usize> {
    queues: Box<[CachePadded<Mutex<DAryHeap<D>>>]>,
    tls: PerThread<SmallRng>,
    resident: AtomicUsize,
}

impl<const D: usize> MultiQueue<D> {
    /// Creates `threads * per_thread` queues.
    pub fn new(threads: usize, per_thread: usize) -> Self {
        let count = (threads * per_thread).max(1);
        Self {
            queues: (0..count)
                .map(|_| CachePadded::new(Mutex::new(DAryHeap::new())))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            tls: PerThread::new(threads, rng_for),
            resident: AtomicUsize::new(0),
        }
    }

    fn pop_two_choice(&self, rng: &mut SmallRng, limit: usize) -> Option<Item> {
        let i = rng.random_range(0..limit);
        let j = rng.random_range(0..limit);
        let top_i = self.queues[i].lock().unwrap().peek();
        let top_j = self.queues[j].lock().unwrap().peek();
        let pick = match (top_i, top_j) {
            (Some(a), Some(b)) => {
                if a <= b {
                    i
                } else {
                    j
                }
            }
            (Some(_), None) => i,
            (None, Some(_)) => j,
            (None, None) => return None,
        };
        // The top may have been taken since the peek; that is fine, the
        // caller falls through to a full sweep.
        self.queues[pick].lock().unwrap().pop()
    }

    fn pop_sweep(&self, start: usize) -> Option<Item> {
        let n = self.queues.len();
        for off in 0..n {
            if let Some(it) = self.queues[(start + off) % n].lock().unwrap().pop() {
                return Some(it);
            }
        }
        None
    }
}

impl<const D: usize> Worklist for MultiQueue<D> {
    fn push(&self, tid: usize, item: Item) {
        // SAFETY: slot `tid` belongs to the calling worker.
        let rng = unsafe { self.tls.get(tid) };
        let q = rng.random_range(0..self.queues.len());
        self.resident.fetch_add(1, Ordering::Release);
        self.queues[q].lock().unwrap().push(item);
    }

    fn pop(&self, tid: usize) -> Option<Item> {
        if self.resident.load(Ordering::Acquire) == 0 {
            return None;
        }
        // SAFETY: slot `tid` belongs to the calling worker.
        let rng = unsafe { self.tls.get(tid) };
        let item = self
            .pop_two_choice(rng, self.queues.len())
            .or_else(|| self.pop_two_choice(rng, self.queues.len()))
            .or_else(|| {
                let start = rng.random_range(0..self.queues.len());
                self.pop_sweep(start)
            });
        if item.is_some() {
            self.resident.fetch_sub(1, Ordering::Release);
        }
        item
    }
}

/// A MultiQueue whose active queue count adapts to observed contention.
pub struct AdaptiveMultiQueue {
    queues: Box<[CachePadded<Mutex<DAryHeap<4>>>]>,
    tls: PerThread<SmallRng>,
    active: AtomicUsize,
    grow: Prob,
    shrink: Prob,
    resident: AtomicUsize,
}

impl AdaptiveMultiQueue {
    /// Creates the queue set: up to `threads * per_thread` queues, starting
    /// with one per thread.
    pub fn new(threads: usize, per_thread: usize, grow: Prob, shrink: Prob) -> Self {
        let max = (threads * per_thread).max(1);
        Self {
            queues: (0..max)
                .map(|_| CachePadded::new(Mutex::new(DAryHeap::new())))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            tls: PerThread::new(threads, rng_for),
            active: AtomicUsize::new(threads.clamp(1, max)),
            grow,
            shrink,
            resident: AtomicUsize::new(0),
        }
    }

    fn sweep(&self, start: usize) -> Option<Item> {
        // Queues beyond the active range may still hold items pushed before
        // a shrink, so the sweep always covers everything.
        let n = self.queues.len();
        for off in 0..n {
            if let Some(it) = self.queues[(start + off) % n].lock().unwrap().pop() {
                return Some(it);
            }
        }
        None
    }
}

impl Worklist for AdaptiveMultiQueue {
    fn push(&self, tid: usize, item: Item) {
        // SAFETY: slot `tid` belongs to the calling worker.
        let rng = unsafe { self.tls.get(tid) };
        self.resident.fetch_add(1, Ordering::Release);
        loop {
            let active = self.active.load(Ordering::Relaxed);
            let q = rng.random_range(0..active);
            match self.queues[q].try_lock() {
                Ok(mut heap) => {
                    heap.push(item);
                    return;
                }
                Err(_) => {
                    // Contention: consider expanding the queue set.
                    if active < self.queues.len() && rng.random_ratio(self.grow.num.min(self.grow.den), self.grow.den)
                    {
                        let _ = self.active.compare_exchange(
                            active,
                            active + 1,
                            Ordering::Relaxed,
                            Ordering::Relaxed,
                        );
                    }
                }
            }
        }
    }

    fn pop(&self, tid: usize) -> Option<Item> {
        if self.resident.load(Ordering::Acquire) == 0 {
            return None;
        }
        // SAFETY: slot `tid` belongs to the calling worker.
        let rng = unsafe { self.tls.get(tid) };
        let active = self.active.load(Ordering::Relaxed);
        let i = rng.random_range(0..active);
        let j = rng.random_range(0..active);
        let top_i = self.queues[i].lock().unwrap().peek();
        let top_j = self.queues[j].lock().unwrap().peek();
        let two_choice = match (top_i, top_j) {
            (Some(a), Some(b)) => self.queues[if a <= b { i } else { j }].lock().unwrap().pop(),
            (Some(_), None) => self.queues[i].lock().unwrap().pop(),
            (None, Some(_)) => self.queues[j].lock().unwrap().pop(),
            (None, None) => {
                // Both sampled queues empty: consider shrinking.
                if active > 1 && rng.random_ratio(self.shrink.num.min(self.shrink.den), self.shrink.den) {
                    let _ = self.active.compare_exchange(
                        active,
                        active - 1,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    );
                }
                None
            }
        };
        let item = two_choice.or_else(|| {
            let start = rng.random_range(0..self.queues.len());
            self.sweep(start)
        });
        if item.is_some() {
            self.resident.fetch_sub(1, Ordering::Release);
        }
        item
    }
}

/// A sorted run spilled out of a thread-local buffer.
struct Run {
    items: Vec<Item>,
    head: usize,
}

impl Run {
    fn remaining(&self) -> usize {
        self.items.len() - self.head
    }

    fn peek(&self) -> Option<Item> {
        self.items.get(self.head).copied()
    }

    fn pop(&mut self) -> Option<Item> {
        let item = self.items.get(self.head).copied();
        if item.is_some() {
            self.head += 1;
        }
        item
    }
}

/// The k-LSM: per-thread insertion buffers bounded by `k`, spilled into a
/// shared list of sorted runs merged geometrically.
pub struct KLsm {
    k: usize,
    locals: PerThread<DAryHeap<4>>,
    shared: Mutex<Vec<Run>>,
}

impl KLsm {
    /// Creates a k-LSM with relaxation bound `k` for `threads` workers.
    pub fn new(threads: usize, k: usize) -> Self {
        Self {
            k: k.max(1),
            locals: PerThread::new(threads, |_| DAryHeap::new()),
            shared: Mutex::new(Vec::new()),
        }
    }

    fn spill(&self, local: &mut DAryHeap<4>) {
        let mut items = Vec::with_capacity(local.len());
        local.drain_into(&mut items);
        items.sort_unstable();
        let mut runs = self.shared.lock().unwrap();
        runs.push(Run { items, head: 0 });
        // Geometric merge: collapse neighbors of comparable size so the run
        // count stays logarithmic in the spilled volume.
        while runs.len() >= 2 {
            let a = runs[runs.len() - 2].remaining();
            let b = runs[runs.len() - 1].remaining();
            if a > b * 2 {
                break;
            }
            let right = runs.pop().unwrap();
            let left = runs.pop().unwrap();
            let mut merged = Vec::with_capacity(a + b);
            merged.extend_from_slice(&left.items[left.head..]);
            merged.extend_from_slice(&right.items[right.head..]);
            merged.sort_unstable();
            runs.push(Run {
                items: merged,
                head: 0,
            });
        }
    }
}

impl Worklist for KLsm {
    fn push(&self, tid: usize, item: Item) {
        // SAFETY: slot `tid` belongs to the calling worker.
        let local = unsafe { self.locals.get(tid) };
        if local.len() >= self.k {
            self.spill(local);
        }
        local.push(item);
    }

    fn pop(&self, tid: usize) -> Option<Item> {
        // SAFETY: slot `tid` belongs to the calling worker.
        let local = unsafe { self.locals.get(tid) };
        let local_top = local.peek();

        let mut runs = self.shared.lock().unwrap();
        let best_run = runs
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.peek().map(|it| (i, it)))
            .min_by_key(|&(_, it)| it);

        match (local_top, best_run) {
            (Some(l), Some((_, s))) if l <= s => {
                drop(runs);
                local.pop()
            }
            (Some(_), None) => {
                drop(runs);
                local.pop()
            }
            (_, Some((i, _))) => {
                let item = runs[i].pop();
                if runs[i].remaining() == 0 {
                    runs.swap_remove(i);
                }
                item
            }
            (None, None) => None,
        }
    }
}

struct SwarmTls {
    /// Batch of popped items, stored descending so the smallest pops last.
    ready: Vec<Item>,
    /// Buffered pushes awaiting a flush (`heapswarm` flavor).
    outbox: Vec<Item>,
}

/// Items moved from the shared heap per refill.
const SWARM_POP_BATCH: usize = 8;
/// Buffered pushes before a forced flush.
const SWARM_PUSH_BATCH: usize = 32;

/// A shared heap with per-thread batching on pop, and optionally on push.
pub struct SwarmPq {
    shared: Mutex<DAryHeap<4>>,
    tls: PerThread<SwarmTls>,
    buffered_push: bool,
}

impl SwarmPq {
    /// Creates the queue for `threads` workers.
    pub fn new(threads: usize, buffered_push: bool) -> Self {
        Self {
            shared: Mutex::new(DAryHeap::new()),
            tls: PerThread::new(threads, |_| SwarmTls {
                ready: Vec::new(),
                outbox: Vec::new(),
            }),
            buffered_push,
        }
    }

    fn flush_outbox(&self, tls: &mut SwarmTls) {
        if tls.outbox.is_empty() {
            return;
        }
        let mut shared = self.shared.lock().unwrap();
        for it in tls.outbox.drain(..) {
            shared.push(it);
        }
    }
}

impl Worklist for SwarmPq {
    fn push(&self, tid: usize, item: Item) {
        // SAFETY: slot `tid` belongs to the calling worker.
        let tls = unsafe { self.tls.get(tid) };
        if self.buffered_push {
            tls.outbox.push(item);
            if tls.outbox.len() >= SWARM_PUSH_BATCH {
                self.flush_outbox(tls);
            }
        } else {
            self.shared.lock().unwrap().push(item);
        }
    }

    fn pop(&self, tid: usize) -> Option<Item> {
        // SAFETY: slot `tid` belongs to the calling worker.
        let tls = unsafe { self.tls.get(tid) };
        if let Some(item) = tls.ready.pop() {
            return Some(item);
        }
        // Own buffered pushes must become reachable before this thread can
        // observe emptiness.
        self.flush_outbox(tls);
        let mut shared = self.shared.lock().unwrap();
        for _ in 0..SWARM_POP_BATCH {
            match shared.pop() {
                Some(it) => tls.ready.push(it),
                None => break,
            }
        }
        drop(shared);
        tls.ready.reverse();
        tls.ready.pop()
    }
}

//! Stealing multi-queue: per-thread heaps with periodic batched stealing.
//!
//! Each worker owns a min-heap and mostly pops its own minimum, which gives
//! much stronger locality than a shared queue at the cost of a looser global
//! order (stealing is probabilistic). Every `period` pops the worker samples
//! two random victims, picks the one whose minimum is better, and moves up
//! to `batch` of its smallest items into the local heap. A worker whose heap
//! runs dry sweeps the victims in random order before giving up.
//!
//! The heaps sit behind per-thread locks: uncontended for the owner, taken
//! briefly by stealers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam_utils::CachePadded;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::exec::per_thread::PerThread;
use crate::sched::heap::DAryHeap;
use crate::sched::{Item, Worklist};

struct SmqTls {
    rng: SmallRng,
    pops: u64,
}

/// The stealing multi-queue scheduler.
pub struct StealingMultiQueue {
    heaps: Box<[CachePadded<Mutex<DAryHeap<4>>>]>,
    tls: PerThread<SmqTls>,
    period: u64,
    batch: usize,
    /// Upper bound on items resident in heaps; lets `pop` skip the victim
    /// sweep when the whole scheduler is empty.
    resident: AtomicUsize,
}

impl StealingMultiQueue {
    /// Creates a stealing multi-queue for `threads` workers.
    pub fn new(threads: usize, period: u32, batch: usize) -> Self {
        let heaps = (0..threads)
            .map(|_| CachePadded::new(Mutex::new(DAryHeap::new())))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            heaps,
            tls: PerThread::new(threads, |i| SmqTls {
                rng: SmallRng::seed_from_u64(0x5347_u64 ^ ((i as u64) << 17)),
                pops: 0,
            }),
            period: u64::from(period),
            batch,
            resident: AtomicUsize::new(0),
        }
    }

    fn victim_pair(&self, tid: usize, rng: &mut SmallRng) -> Option<(usize, usize)> {
        let n = self.heaps.len();
        if n < 2 {
            return None;
        }
        let mut a = rng.random_range(0..n);
        if a == tid {
            a = (a + 1) % n;
        }
        let mut b = rng.random_range(0..n);
        if b == tid {
            b = (b + 1) % n;
        }
        Some((a, b))
    }

    /// Moves up to `batch` items from the better of two random victims into
    /// the local heap.
    fn steal_round(&self, tid: usize, rng: &mut SmallRng) {
        let Some((a, b)) = self.victim_pair(tid, rng) else {
            return;
        };
        let top_a = self.heaps[a].lock().unwrap().peek();
        let top_b = self.heaps[b].lock().unwrap().peek();
        let victim = match (top_a, top_b) {
            (Some(x), Some(y)) => {
                if x <= y {
                    a
                } else {
                    b
                }
            }
            (Some(_), None) => a,
            (None, Some(_)) => b,
            (None, None) => return,
        };
        let mut grabbed = Vec::with_capacity(self.batch);
        {
            let mut heap = self.heaps[victim].lock().unwrap();
            for _ in 0..self.batch {
                match heap.pop() {
                    Some(it) => grabbed.push(it),
                    None => break,
                }
            }
        }
        if grabbed.is_empty() {
            return;
        }
        let mut own = self.heaps[tid].lock().unwrap();
        for it in grabbed {
            own.push(it);
        }
    }

    /// Takes one item from some victim, sweeping them in random order.
    fn steal_one(&self, tid: usize, rng: &mut SmallRng) -> Option<Item> {
        let n = self.heaps.len();
        let start = rng.random_range(0..n.max(1));
        for off in 0..n {
            let v = (start + off) % n;
            if v == tid {
                continue;
            }
            if let Some(it) = self.heaps[v].lock().unwrap().pop() {
                return Some(it);
            }
        }
        None
    }
}

impl Worklist for StealingMultiQueue {
    fn push(&self, tid: usize, item: Item) {
        self.resident.fetch_add(1, Ordering::Release);
        self.heaps[tid].lock().unwrap().push(item);
    }

    fn pop(&self, tid: usize) -> Option<Item> {
        // SAFETY: slot `tid` belongs to the calling worker.
        let tls = unsafe { self.tls.get(tid) };
        tls.pops += 1;
        if tls.pops % self.period == 0 {
            self.steal_round(tid, &mut tls.rng);
        }
        let item = {
            let mut own = self.heaps[tid].lock().unwrap();
            own.pop()
        }
        .or_else(|| {
            if self.resident.load(Ordering::Acquire) == 0 {
                None
            } else {
                self.steal_one(tid, &mut tls.rng)
            }
        });
        if item.is_some() {
            self.resident.fetch_sub(1, Ordering::Release);
        }
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_drains_its_own_pushes() {
        let wl = StealingMultiQueue::new(2, 8, 1);
        for i in 0..20 {
            wl.push(0, Item::new(i, u64::from(100 - i)));
        }
        let mut got = Vec::new();
        while let Some(it) = wl.pop(0) {
            got.push(it);
        }
        assert_eq!(got.len(), 20);
        // Own pops come out in priority order between steals.
        let mut sorted = got.clone();
        sorted.sort();
        assert_eq!(got, sorted);
    }

    #[test]
    fn empty_worker_steals_from_victims() {
        let wl = StealingMultiQueue::new(4, 8, 4);
        for i in 0..32 {
            wl.push(1, Item::new(i, u64::from(i)));
        }
        let mut got = 0;
        while wl.pop(3).is_some() {
            got += 1;
        }
        assert_eq!(got, 32);
    }

    #[test]
    fn conservation_under_concurrency() {
        use std::sync::atomic::AtomicU64;
        const N: u32 = 2000;
        let wl = StealingMultiQueue::new(4, 2, 16);
        let popped = AtomicU64::new(0);
        std::thread::scope(|s| {
            let wl = &wl;
            let popped = &popped;
            for tid in 0..4 {
                s.spawn(move || {
                    for i in 0..N {
                        wl.push(tid, Item::new(i, u64::from(i)));
                    }
                    let mut dry = 0;
                    while dry < 100 {
                        if wl.pop(tid).is_some() {
                            popped.fetch_add(1, Ordering::Relaxed);
                            dry = 0;
                        } else {
                            dry += 1;
                            std::thread::yield_now();
                        }
                    }
                });
            }
        });
        assert_eq!(popped.load(Ordering::Relaxed), u64::from(N) * 4);
    }
}

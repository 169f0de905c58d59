//! The operator driver: pull, invoke, push, quiesce.
//!
//! Each worker runs the same loop against a monomorphized scheduler: pop an
//! item, hand it to the operator together with a context handle, absorb the
//! pushes the operator made, and when the scheduler looks empty join the
//! termination protocol. Stale-item filtering is the operator's job; the
//! driver never inspects items. All operators here are abort-free, so the
//! loop carries no conflict-detection bookkeeping.
//!
//! A cooperative break (from an operator, e.g. an iteration cap) makes every
//! worker drain its reachable items without invoking the operator and exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::exec::context::Context;
use crate::exec::per_thread::PerThread;
use crate::exec::quiesce::Quiesce;
use crate::exec::stats::{RunStats, ThreadStats};
use crate::sched::global::{AdaptiveMultiQueue, ExactPq, KLsm, MultiQueue, SprayPq, SwarmPq};
use crate::sched::obim::Obim;
use crate::sched::stealing::StealingMultiQueue;
use crate::sched::{Item, Worklist, WorklistSpec};

/// An operator body: one application per dequeued item.
///
/// Applications must be safe to run concurrently on distinct items; all
/// coordination goes through the per-node atomic state and the context.
pub trait Operator: Sync {
    /// Applies the operator to `item`.
    fn apply<W: Worklist>(&self, item: Item, ctx: &mut Context<'_, W>);
}

/// Outcome of a run.
pub struct RunReport {
    /// Aggregated per-thread counters.
    pub stats: RunStats,
    /// Wall-clock time of the parallel phase.
    pub elapsed: Duration,
    /// Whether the run ended through a cooperative break.
    pub broke: bool,
}

/// Runs `op` to quiescence over `initial` using the given scheduler.
///
/// The initial items are spread round-robin over the workers and pushed
/// from each worker's own loop, so per-thread schedulers start warm.
pub fn run_loop<W: Worklist, O: Operator>(
    wl: &W,
    op: &O,
    threads: usize,
    initial: Vec<Item>,
) -> RunReport {
    assert!(threads > 0, "at least one worker required");
    let quiesce = Quiesce::new(threads);
    let stop = AtomicBool::new(false);
    let shards: PerThread<ThreadStats> = PerThread::new(threads, |_| ThreadStats::default());

    let mut parts: Vec<Vec<Item>> = (0..threads).map(|_| Vec::new()).collect();
    for (i, item) in initial.into_iter().enumerate() {
        parts[i % threads].push(item);
    }

    let started = Instant::now();
    std::thread::scope(|s| {
        for (tid, part) in parts.drain(..).enumerate() {
            let quiesce = &quiesce;
            let stop = &stop;
            let shards = &shards;
            s.spawn(move || {
                wl.on_thread_start(tid);
                // SAFETY: shard `tid` is owned by this worker for the whole
                // scope; the driver assigns each id exactly once.
                let stats = unsafe { shards.get(tid) };
                let mut ctx = Context::new(wl, tid, stats, stop, quiesce);
                for item in part {
                    ctx.push(item);
                }
                worker_loop(wl, op, tid, &mut ctx, stop, quiesce);
                wl.on_thread_end(tid);
            });
        }
    });
    let elapsed = started.elapsed();
    let broke = stop.load(Ordering::Acquire);

    let stats = RunStats::aggregate(&shards.into_values());
    debug!(
        nodes_processed = stats.nodes_processed,
        stale = stats.n_empty,
        pushes = stats.pushes,
        pops = stats.pops,
        broke,
        "run finished"
    );
    RunReport {
        stats,
        elapsed,
        broke,
    }
}

fn worker_loop<W: Worklist, O: Operator>(
    wl: &W,
    op: &O,
    tid: usize,
    ctx: &mut Context<'_, W>,
    stop: &AtomicBool,
    quiesce: &Quiesce,
) {
    loop {
        if stop.load(Ordering::Acquire) {
            drain(wl, tid, ctx);
            return;
        }
        let item = match wl.pop(tid) {
            Some(item) => item,
            None => match quiesce.idle(tid, stop, || wl.pop(tid)) {
                Some(item) => item,
                None => {
                    if stop.load(Ordering::Acquire) {
                        drain(wl, tid, ctx);
                    }
                    return;
                }
            },
        };
        ctx.stats().pops += 1;
        op.apply(item, ctx);
        if ctx.take_empty() {
            wl.note_empty(tid);
        }
    }
}

/// Empties everything this worker can reach without invoking the operator.
fn drain<W: Worklist>(wl: &W, tid: usize, ctx: &mut Context<'_, W>) {
    while wl.pop(tid).is_some() {
        ctx.stats().pops += 1;
    }
}

/// Dispatches a parsed `--wl` selection to its concrete engine and runs the
/// loop, monomorphized per engine. `CHUNK` sets the OBIM bag chunk size.
pub fn run_with_spec<const CHUNK: usize, O: Operator>(
    spec: &WorklistSpec,
    threads: usize,
    initial: Vec<Item>,
    op: &O,
) -> RunReport {
    match *spec {
        WorklistSpec::Obim { delta } => {
            run_loop(&Obim::<CHUNK>::new(threads, delta, false), op, threads, initial)
        }
        WorklistSpec::AdaptiveObim { delta } => {
            run_loop(&Obim::<CHUNK>::new(threads, delta, true), op, threads, initial)
        }
        WorklistSpec::Stealing { period, batch } => run_loop(
            &StealingMultiQueue::new(threads, period, batch),
            op,
            threads,
            initial,
        ),
        WorklistSpec::MultiQueue { per_thread, wide } => {
            if wide {
                run_loop(&MultiQueue::<4>::new(threads, per_thread), op, threads, initial)
            } else {
                run_loop(&MultiQueue::<2>::new(threads, per_thread), op, threads, initial)
            }
        }
        WorklistSpec::AdaptiveMultiQueue {
            per_thread,
            grow,
            shrink,
        } => run_loop(
            &AdaptiveMultiQueue::new(threads, per_thread, grow, shrink),
            op,
            threads,
            initial,
        ),
        WorklistSpec::Exact => run_loop(&ExactPq::new(threads), op, threads, initial),
        WorklistSpec::Spray => run_loop(&SprayPq::new(threads), op, threads, initial),
        WorklistSpec::KLsm { k } => run_loop(&KLsm::new(threads, k), op, threads, initial),
        WorklistSpec::Swarm { buffered_push } => run_loop(
            &SwarmPq::new(threads, buffered_push),
            op,
            threads,
            initial,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    /// Counts applications and re-pushes each item `key` times with key 0.
    struct Fanout {
        applied: AtomicU64,
    }

    impl Operator for Fanout {
        fn apply<W: Worklist>(&self, item: Item, ctx: &mut Context<'_, W>) {
            self.applied.fetch_add(1, Ordering::Relaxed);
            ctx.stats().nodes_processed += 1;
            for i in 0..item.key {
                let _ = i;
                ctx.push(Item::new(item.node, 0));
            }
        }
    }

    #[test]
    fn fanout_terminates_and_conserves_items() {
        let op = Fanout {
            applied: AtomicU64::new(0),
        };
        let initial = vec![Item::new(0, 3), Item::new(1, 2)];
        let spec = WorklistSpec::parse("obim", 2).unwrap();
        let report = run_with_spec::<8, _>(&spec, 4, initial, &op);
        // 2 seeds + 3 + 2 children.
        assert_eq!(op.applied.load(Ordering::Relaxed), 7);
        assert_eq!(report.stats.pushes, 7);
        assert_eq!(report.stats.pops, 7);
        assert!(!report.broke);
    }

    /// Breaks immediately; pending items must be drained, not applied.
    struct Breaker {
        applied: AtomicU64,
    }

    impl Operator for Breaker {
        fn apply<W: Worklist>(&self, _item: Item, ctx: &mut Context<'_, W>) {
            self.applied.fetch_add(1, Ordering::Relaxed);
            ctx.request_break();
        }
    }

    #[test]
    fn break_drains_without_applying() {
        let op = Breaker {
            applied: AtomicU64::new(0),
        };
        let initial: Vec<Item> = (0..1000).map(|i| Item::new(i, u64::from(i))).collect();
        let spec = WorklistSpec::parse("pq", 0).unwrap();
        let report = run_with_spec::<64, _>(&spec, 2, initial, &op);
        assert!(report.broke);
        // Few applications, everything else drained.
        assert!(op.applied.load(Ordering::Relaxed) < 1000);
        assert_eq!(report.stats.pushes, report.stats.pops);
    }

    #[test]
    fn single_thread_round_trips_every_engine() {
        for name in [
            "obim",
            "adap-obim",
            "smq_8_1",
            "mq2",
            "hmq2",
            "amq2",
            "skiplist",
            "spraylist",
            "klsm256",
            "swarm",
            "heapswarm",
            "pq",
        ] {
            let op = Fanout {
                applied: AtomicU64::new(0),
            };
            let initial = vec![Item::new(0, 4)];
            let spec = WorklistSpec::parse(name, 4).unwrap();
            let report = run_with_spec::<16, _>(&spec, 1, initial, &op);
            assert_eq!(op.applied.load(Ordering::Relaxed), 5, "engine {name}");
            assert_eq!(report.stats.pops, 5, "engine {name}");
        }
    }
}

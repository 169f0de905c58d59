//! The concurrent scheduler family.
//!
//! Every scheduler implements the same small capability, [`Worklist`], and
//! every one of them is *relaxed*: items within a priority neighborhood may
//! execute in any order and concurrently, and a thread may run work from a
//! higher priority while another thread still holds lower-priority work.
//! Strictness varies by engine:
//!
//! - [`obim::Obim`]: ordered-by-integer-metric buckets of chunked bags,
//!   best-effort lowest-bucket-first (optionally with adaptive bucket width)
//! - [`stealing::StealingMultiQueue`]: per-thread heaps with periodic
//!   batched stealing, strong locality, probabilistic global order
//! - [`global`]: shared queues from exact order down to spray/k-LSM
//!   relaxation
//!
//! Engines are selected by name at process start ([`WorklistSpec::parse`])
//! and the operator loop is monomorphized per engine; there is no virtual
//! dispatch in the hot path.

pub mod chunk;
pub mod global;
pub mod heap;
pub mod item;
pub mod obim;
pub mod stealing;

pub use item::{key_priority, signed_key, Item};

/// The scheduler capability the operator driver runs against.
///
/// `tid` is the dense worker id assigned by the driver; implementations use
/// it to index their per-thread state. A `pop` that returns `None` must have
/// scanned everything reachable by the calling thread (its own local state
/// and all shared state); the driver's quiescence protocol relies on that.
pub trait Worklist: Sync {
    /// Inserts an item on behalf of worker `tid`.
    fn push(&self, tid: usize, item: Item);

    /// Removes some item of (approximately) minimal priority.
    fn pop(&self, tid: usize) -> Option<Item>;

    /// Called by each worker before its first operation.
    fn on_thread_start(&self, tid: usize) {
        let _ = tid;
    }

    /// Called by each worker after its loop exits.
    fn on_thread_end(&self, tid: usize) {
        let _ = tid;
    }

    /// Feedback from the driver: the last popped item turned out to be
    /// stale. Adaptive engines use this to retune; others ignore it.
    fn note_empty(&self, tid: usize) {
        let _ = tid;
    }
}

/// A parsed `--wl` selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorklistSpec {
    /// `obim`: ordered-by-integer-metric with a fixed delta shift.
    Obim {
        /// Bucket shift.
        delta: u32,
    },
    /// `adap-obim`: OBIM with runtime delta tuning.
    AdaptiveObim {
        /// Initial bucket shift.
        delta: u32,
    },
    /// `smq_<period>_<batch>`: stealing multi-queue.
    Stealing {
        /// Steal attempt period, in pops.
        period: u32,
        /// Items moved per steal.
        batch: usize,
    },
    /// `mq<c>` / `hmq<c>`: multi-queue with `c` queues per thread.
    MultiQueue {
        /// Queues per thread.
        per_thread: usize,
        /// Wide (4-ary) heaps instead of binary ones.
        wide: bool,
    },
    /// `amq2*`: multi-queue whose active queue count adapts to contention.
    AdaptiveMultiQueue {
        /// Queues per thread at full expansion.
        per_thread: usize,
        /// Probability of growing on push contention.
        grow: Prob,
        /// Probability of shrinking on empty pops.
        shrink: Prob,
    },
    /// `skiplist` / `pq`: one shared exact-order queue.
    Exact,
    /// `spraylist`: shared queue, pop sprays among the smallest items.
    Spray,
    /// `klsm<k>`: k-LSM with relaxation bound `k`.
    KLsm {
        /// Relaxation bound (local buffer capacity).
        k: usize,
    },
    /// `swarm` / `heapswarm`: shared heap with per-thread batching.
    Swarm {
        /// Also buffer pushes (the `heapswarm` flavor).
        buffered_push: bool,
    },
}

/// A rational probability `num / den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prob {
    /// Numerator.
    pub num: u32,
    /// Denominator.
    pub den: u32,
}

impl Prob {
    /// Certainty.
    pub const ALWAYS: Prob = Prob { num: 1, den: 1 };
}

impl WorklistSpec {
    /// Parses a `--wl` name. `delta` seeds the OBIM family.
    ///
    /// Returns `None` for unknown names.
    pub fn parse(name: &str, delta: u32) -> Option<Self> {
        match name {
            "obim" => return Some(Self::Obim { delta }),
            "adap-obim" => return Some(Self::AdaptiveObim { delta }),
            "skiplist" | "pq" => return Some(Self::Exact),
            "spraylist" => return Some(Self::Spray),
            "klsm256" => return Some(Self::KLsm { k: 256 }),
            "klsm16k" => return Some(Self::KLsm { k: 16_384 }),
            "klsm4m" => return Some(Self::KLsm { k: 4_194_304 }),
            "swarm" => return Some(Self::Swarm {
                buffered_push: false,
            }),
            "heapswarm" => return Some(Self::Swarm {
                buffered_push: true,
            }),
            // Historical aliases for the tuned stealing variants.
            "smq_ctr" | "smq_usa" => return Some(Self::Stealing { period: 8, batch: 1 }),
            "smq_lj" => return Some(Self::Stealing { period: 8, batch: 8 }),
            "smq_twi" => return Some(Self::Stealing {
                period: 2,
                batch: 16,
            }),
            _ => {}
        }

        if let Some(rest) = name.strip_prefix("smq_") {
            let mut it = rest.split('_');
            let period: u32 = it.next()?.parse().ok()?;
            let batch: usize = it.next()?.parse().ok()?;
            if it.next().is_some() || period == 0 || batch == 0 {
                return None;
            }
            return Some(Self::Stealing { period, batch });
        }
        if let Some(rest) = name.strip_prefix("hmq") {
            let per_thread: usize = rest.parse().ok()?;
            if per_thread == 0 {
                return None;
            }
            return Some(Self::MultiQueue {
                per_thread,
                wide: true,
            });
        }
        if let Some(rest) = name.strip_prefix("mq") {
            let per_thread: usize = rest.parse().ok()?;
            if per_thread == 0 {
                return None;
            }
            return Some(Self::MultiQueue {
                per_thread,
                wide: false,
            });
        }
        if name.starts_with("amq2") {
            // amq2, amq2_<gn>_<gd>_<sn>_<sd>, amq2cp_<gn>_<gd>_<sn>_<sd>
            let rest = name
                .strip_prefix("amq2cp_")
                .or_else(|| name.strip_prefix("amq2_"))
                .unwrap_or("");
            if rest.is_empty() && name != "amq2" {
                return None;
            }
            let (grow, shrink) = if rest.is_empty() {
                (Prob::ALWAYS, Prob::ALWAYS)
            } else {
                let parts: Vec<u32> = rest.split('_').map(str::parse).collect::<Result<_, _>>().ok()?;
                if parts.len() != 4 || parts[1] == 0 || parts[3] == 0 {
                    return None;
                }
                (
                    Prob {
                        num: parts[0],
                        den: parts[1],
                    },
                    Prob {
                        num: parts[2],
                        den: parts[3],
                    },
                )
            };
            return Some(Self::AdaptiveMultiQueue {
                per_thread: 2,
                grow,
                shrink,
            });
        }
        None
    }

    /// Whether the result-file line should carry the delta column.
    pub fn reports_delta(&self) -> bool {
        matches!(self, Self::Obim { .. } | Self::AdaptiveObim { .. })
    }
}

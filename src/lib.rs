//! # `surge` - Parallel Graph Relaxation Engine
//!
//! A parallel graph-processing engine whose core is a family of *relaxed*
//! concurrent priority schedulers and the amorphous-data-parallelism operator
//! loop built on top of them. Three algorithms are expressed as short operator
//! bodies over a shared work set:
//!
//! - single-source shortest path (SSSP)
//! - A* search with a great-circle heuristic
//! - residual-priority PageRank
//!
//! ## Architecture
//!
//! The scheduler decides the order in which relaxations execute across worker
//! threads, and that ordering is the dominant performance concern: too loose
//! and the program does far more work than needed, too tight and threads
//! serialize on the queue. Every scheduler here is deliberately relaxed; only
//! the degree of looseness varies.
//!
//! - [`sched`]: work items, chunked bags, and the scheduler family
//!   (OBIM, adaptive OBIM, stealing multi-queues, shared relaxed PQs)
//! - [`exec`]: the pull-invoke-push operator driver, quiescence detection,
//!   and per-thread statistics
//! - [`graph`]: immutable CSR storage plus the per-node atomic state that
//!   operators mutate with CAS
//! - [`algo`]: the three operator bodies, a serial reference solver, and the
//!   post-run consistency checks
//!
//! ## Example
//!
//! ```rust
//! use surge::algo::sssp::Sssp;
//! use surge::exec::run_with_spec;
//! use surge::graph::{node::DistArray, Csr, Graph};
//! use surge::sched::WorklistSpec;
//!
//! let csr = Csr::from_edges(3, &[(0, 1, 4), (1, 2, 1)]);
//! let graph = Graph::new(csr);
//! let dist = DistArray::new(graph.node_count());
//! let op = Sssp::new(&graph, &dist);
//! let initial = op.seed(0);
//! let spec = WorklistSpec::parse("obim", 10).unwrap();
//! run_with_spec::<64, _>(&spec, 2, initial, &op);
//! assert_eq!(dist.dist(2), 5);
//! ```

#![warn(missing_docs, clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod algo;
pub mod cli;
pub mod exec;
pub mod graph;
pub mod report;
pub mod sched;

pub use exec::{run_with_spec, RunReport};
pub use graph::{Csr, Graph, NodeId, Weight};
pub use sched::{Item, WorklistSpec};

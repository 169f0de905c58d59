//! Single-source shortest path by chaotic relaxation.
//!
//! The operator pops `(node, key)` requests where `key` is the distance the
//! node had when the request was pushed. A request whose key no longer
//! matches the node's current distance is stale and is discarded without
//! touching the graph (the improvement that invalidated it already pushed a
//! fresher request). A live request relaxes every out-edge with a CAS loop
//! on the neighbor's packed distance word and pushes a request for every
//! neighbor it improved.
//!
//! Work accounting: after a completed application the elapsed stopwatch
//! sample is CAS-ed into the high half of the node's own distance word. A
//! later application that finds those bits set knows the earlier round was
//! wasted and charges its edges to bad work, mirroring the low-overhead
//! accounting of the packed representation.

use crate::exec::{Context, Operator};
use crate::graph::node::{DistArray, DIST_INFINITY, WORK_MASK};
use crate::graph::{Graph, NodeId, Weight};
use crate::sched::{Item, Worklist};

/// The SSSP operator over a graph and its distance array.
pub struct Sssp<'g> {
    graph: &'g Graph,
    dist: &'g DistArray,
}

impl<'g> Sssp<'g> {
    /// Binds the operator to its state.
    pub fn new(graph: &'g Graph, dist: &'g DistArray) -> Self {
        assert!(graph.node_count() == dist.len());
        Self { graph, dist }
    }

    /// Sets the source distance to zero and relaxes its out-edges serially,
    /// returning the initial work set.
    pub fn seed(&self, source: NodeId) -> Vec<Item> {
        self.dist.store_dist(source, 0);
        let mut initial = Vec::new();
        for (v, w) in self.graph.out_edges(source) {
            self.relax_edge(v, w, 0, &mut |item| initial.push(item));
        }
        initial
    }

    /// Attempts to improve `v` through an edge of weight `w` from a node at
    /// distance `sdist`. On success the improved request is handed to
    /// `push`.
    fn relax_edge(&self, v: NodeId, w: Weight, sdist: u32, push: &mut impl FnMut(Item)) {
        let nd = u64::from(sdist) + u64::from(w);
        if nd >= u64::from(DIST_INFINITY) {
            return;
        }
        let nd = nd as u32;
        let mut cur = self.dist.word(v);
        while nd < (cur as u32) {
            // Keep the accounting half intact; only the distance improves.
            let new_word = (cur & WORK_MASK) | u64::from(nd);
            match self.dist.cas_word(v, cur, new_word) {
                Ok(()) => {
                    push(Item::new(v, u64::from(nd)));
                    break;
                }
                Err(seen) => cur = seen,
            }
        }
    }
}

impl Operator for Sssp<'_> {
    fn apply<W: Worklist>(&self, req: Item, ctx: &mut Context<'_, W>) {
        let node = req.node;
        let sdist = self.dist.dist(node);
        ctx.stats().nodes_processed += 1;

        if req.key != u64::from(sdist) {
            let lap = ctx.lap_us();
            let stats = ctx.stats();
            stats.n_empty += 1;
            stats.empty_work += lap;
            ctx.mark_empty();
            return;
        }

        let mut n_edge: u64 = 0;
        for (v, w) in self.graph.out_edges(node) {
            if self.dist.dist(node) != sdist {
                // Improved under our feet: the rest of this round is wasted.
                let lap = ctx.lap_us();
                let stats = ctx.stats();
                stats.n_bad += n_edge;
                stats.n_overall += n_edge;
                stats.bad_work += lap;
                return;
            }
            self.relax_edge(v, w, sdist, &mut |item| ctx.push(item));
            n_edge += 1;
            ctx.stats().n_edges += 1;
        }

        let sample = ctx.lap_us();
        let old_word = self.dist.word(node);
        let old_work = DistArray::work_of(old_word);
        {
            let stats = ctx.stats();
            stats.n_overall += n_edge;
            if old_work != 0 {
                stats.n_bad += n_edge;
                stats.bad_work += old_work;
            }
        }
        // Record this round's work. If the node improved since (or the CAS
        // loses), this round itself was wasted; undo the provisional
        // accounting to avoid double counting.
        let new_word = u64::from(sdist) | (sample.min(u64::from(u32::MAX)) << 32);
        let lost = (old_word as u32) < sdist
            || self.dist.cas_word(node, old_word, new_word).is_err();
        if lost {
            let stats = ctx.stats();
            if old_work == 0 {
                stats.n_bad += n_edge;
            } else {
                stats.bad_work -= old_work;
            }
            stats.bad_work += sample;
        }
    }
}

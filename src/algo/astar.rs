//! A* search: SSSP with a heuristic-biased key and goal pruning.
//!
//! The scheduling key of a request for `n` is `dist(n) + h(n)`, where `h`
//! is the equirectangular great-circle distance (meters) from `n` to the
//! destination, computed from micro-degree coordinates. Relaxation is the
//! same CAS loop as SSSP; the differences are the push key and a pruning
//! rule that drops pushes already worse than the best known route to the
//! destination.
//!
//! The heuristic is scaled by a runtime factor. At `1.0` it never
//! overestimates road distance and the result is optimal; the default
//! `0.75` trades a bounded amount of suboptimality for a faster search.
//! The run still terminates through ordinary quiescence; pruning just
//! starves the queue once the goal region is settled.

use crate::exec::{Context, Operator};
use crate::graph::io::Coords;
use crate::graph::node::{DistArray, DIST_INFINITY, WORK_MASK};
use crate::graph::{Graph, NodeId, Weight};
use crate::sched::{Item, Worklist};

/// Mean Earth radius, meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// The A* operator.
pub struct Astar<'g> {
    graph: &'g Graph,
    dist: &'g DistArray,
    coords: &'g Coords,
    dest: NodeId,
    scale: f64,
}

impl<'g> Astar<'g> {
    /// Binds the operator to its state. `scale` multiplies the heuristic.
    pub fn new(
        graph: &'g Graph,
        dist: &'g DistArray,
        coords: &'g Coords,
        dest: NodeId,
        scale: f64,
    ) -> Self {
        assert!(graph.node_count() == dist.len());
        assert!(coords.x.len() == graph.node_count());
        assert!((dest as usize) < graph.node_count());
        Self {
            graph,
            dist,
            coords,
            dest,
            scale,
        }
    }

    /// Heuristic distance from `node` to the destination, in edge-weight
    /// units (meters for the road graphs this is meant for).
    pub fn heuristic(&self, node: NodeId) -> u64 {
        let lat1 = micro_deg_to_rad(self.coords.x[node as usize]);
        let lat2 = micro_deg_to_rad(self.coords.x[self.dest as usize]);
        let lon1 = micro_deg_to_rad(self.coords.y[node as usize]);
        let lon2 = micro_deg_to_rad(self.coords.y[self.dest as usize]);
        // Equirectangular approximation; plenty for a heuristic.
        let x = (lon2 - lon1) * (0.5 * (lat1 + lat2)).cos();
        let y = lat2 - lat1;
        let meters = EARTH_RADIUS_M * (x * x + y * y).sqrt();
        (meters * self.scale) as u64
    }

    /// Sets the source distance to zero and relaxes its out-edges serially.
    pub fn seed(&self, source: NodeId) -> Vec<Item> {
        self.dist.store_dist(source, 0);
        let mut initial = Vec::new();
        for (v, w) in self.graph.out_edges(source) {
            self.relax_edge(v, w, 0, &mut |item| initial.push(item));
        }
        initial
    }

    fn relax_edge(&self, v: NodeId, w: Weight, sdist: u32, push: &mut impl FnMut(Item)) {
        let nd = u64::from(sdist) + u64::from(w);
        if nd >= u64::from(DIST_INFINITY) {
            return;
        }
        let nd = nd as u32;
        let goal_dist = self.dist.dist(self.dest);
        let mut cur = self.dist.word(v);
        while nd < (cur as u32) {
            let new_word = (cur & WORK_MASK) | u64::from(nd);
            match self.dist.cas_word(v, cur, new_word) {
                Ok(()) => {
                    // Anything already at or past the best known route to
                    // the goal cannot shorten it; skip the push.
                    if nd <= goal_dist {
                        push(Item::new(v, u64::from(nd) + self.heuristic(v)));
                    }
                    break;
                }
                Err(seen) => cur = seen,
            }
        }
    }
}

impl Operator for Astar<'_> {
    fn apply<W: Worklist>(&self, req: Item, ctx: &mut Context<'_, W>) {
        let node = req.node;
        let h = self.heuristic(node);
        let sdist = self.dist.dist(node);
        ctx.stats().nodes_processed += 1;

        if req.key < h || req.key - h != u64::from(sdist) {
            let lap = ctx.lap_us();
            let stats = ctx.stats();
            stats.n_empty += 1;
            stats.empty_work += lap;
            ctx.mark_empty();
            return;
        }

        let mut n_edge: u64 = 0;
        for (v, w) in self.graph.out_edges(node) {
            if u64::from(self.dist.dist(node)) != req.key - h {
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

fn micro_deg_to_rad(micro: i32) -> f64 {
    (f64::from(micro) / 1_000_000.0).to_radians()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::run_with_spec;
    use crate::graph::Csr;
    use crate::sched::WorklistSpec;

    fn flat_coords(n: usize) -> Coords {
        Coords {
            x: vec![0; n],
            y: vec![0; n],
        }
    }

    #[test]
    fn zero_heuristic_reduces_to_sssp() {
        let graph = Graph::new(Csr::from_edges(
            4,
            &[(0, 1, 1), (0, 2, 10), (1, 3, 1), (2, 3, 1)],
        ));
        let dist = DistArray::new(4);
        let coords = flat_coords(4);
        let op = Astar::new(&graph, &dist, &coords, 3, 0.75);
        let initial = op.seed(0);
        let spec = WorklistSpec::parse("obim", 10).unwrap();
        run_with_spec::<64, _>(&spec, 2, initial, &op);
        assert_eq!(dist.dist(3), 2);
    }

    #[test]
    fn heuristic_is_zero_at_destination() {
        let graph = Graph::new(Csr::from_edges(2, &[(0, 1, 1)]));
        let dist = DistArray::new(2);
        let coords = Coords {
            x: vec![48_000_000, 48_500_000],
            y: vec![2_000_000, 2_500_000],
        };
        let op = Astar::new(&graph, &dist, &coords, 1, 1.0);
        assert_eq!(op.heuristic(1), 0);
        assert!(op.heuristic(0) > 0);
    }

    #[test]
    fn equirectangular_scale_is_plausible() {
        // One degree of latitude is ~111 km.
        let graph = Graph::new(Csr::from_edges(2, &[(0, 1, 1)]));
        let dist = DistArray::new(2);
        let coords = Coords {
            x: vec![0, 1_000_000],
            y: vec![0, 0],
        };
        let op = Astar::new(&graph, &dist, &coords, 1, 1.0);
        let h = op.heuristic(0);
        assert!((100_000..125_000).contains(&h), "got {h}");
    }
}

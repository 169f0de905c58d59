//! Post-run consistency checks.
//!
//! After the driver terminates, every edge must satisfy the triangle
//! inequality `dist(v) <= dist(u) + w`; a reachable node left at infinity
//! is reported (it is only an error for strongly connected inputs, so it
//! does not fail the check by itself, matching the external contract of the
//! drivers).

use crate::graph::node::{DistArray, DIST_INFINITY};
use crate::graph::{Graph, NodeId, Weight};

/// A verification failure.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The source node does not sit at distance zero.
    #[error("source node {node} has non-zero distance {dist}")]
    NonZeroSource {
        /// The source node.
        node: NodeId,
        /// Its distance.
        dist: u32,
    },
    /// An edge admits a shortcut the run missed.
    #[error(
        "edge {u}->{v} (weight {w}) violates consistency: dist({u})={du}, dist({v})={dv}"
    )]
    Inconsistent {
        /// Edge source.
        u: NodeId,
        /// Edge target.
        v: NodeId,
        /// Edge weight.
        w: Weight,
        /// Distance of `u`.
        du: u32,
        /// Distance of `v`.
        dv: u32,
    },
}

/// Summary of a successful check.
#[derive(Debug)]
pub struct DistSummary {
    /// Nodes still at infinity.
    pub unvisited: u64,
    /// Largest finite distance.
    pub max_dist: u32,
}

/// Checks a distance assignment for shortest-path consistency.
pub fn check_dists(
    graph: &Graph,
    dist: &DistArray,
    source: NodeId,
) -> Result<DistSummary, VerifyError> {
    check_dists_bounded(graph, dist, source, u32::MAX)
}

/// Like [`check_dists`], but only inspects edges out of nodes at distance
/// `<= bound`.
///
/// A goal-pruned search (A*) improves distances past the best known route
/// to the destination without ever expanding those nodes, so their
/// out-edges legitimately admit shortcuts. Nodes at or under the final
/// destination distance were always expanded with their final distance,
/// which makes the bounded region a sound thing to check.
pub fn check_dists_bounded(
    graph: &Graph,
    dist: &DistArray,
    source: NodeId,
    bound: u32,
) -> Result<DistSummary, VerifyError> {
    if dist.dist(source) != 0 {
        return Err(VerifyError::NonZeroSource {
            node: source,
            dist: dist.dist(source),
        });
    }

    let mut unvisited = 0u64;
    let mut max_dist = 0u32;
    for u in 0..graph.node_count() as NodeId {
        let du = dist.dist(u);
        if du >= DIST_INFINITY {
            unvisited += 1;
            continue;
        }
        if du > max_dist {
            max_dist = du;
        }
        if du > bound {
            continue;
        }
        for (v, w) in graph.out_edges(u) {
            let dv = dist.dist(v);
            if u64::from(dv) > u64::from(du) + u64::from(w) {
                return Err(VerifyError::Inconsistent { u, v, w, du, dv });
            }
        }
    }
    Ok(DistSummary {
        unvisited,
        max_dist,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Csr;

    #[test]
    fn accepts_a_correct_assignment() {
        let g = Graph::new(Csr::from_edges(3, &[(0, 1, 2), (1, 2, 2)]));
        let d = DistArray::new(3);
        d.store_dist(0, 0);
        d.store_dist(1, 2);
        d.store_dist(2, 4);
        let summary = check_dists(&g, &d, 0).unwrap();
        assert_eq!(summary.unvisited, 0);
        assert_eq!(summary.max_dist, 4);
    }

    #[test]
    fn rejects_a_missed_shortcut() {
        let g = Graph::new(Csr::from_edges(2, &[(0, 1, 1)]));
        let d = DistArray::new(2);
        d.store_dist(0, 0);
        d.store_dist(1, 5);
        assert!(matches!(
            check_dists(&g, &d, 0),
            Err(VerifyError::Inconsistent { u: 0, v: 1, .. })
        ));
    }

    #[test]
    fn rejects_nonzero_source() {
        let g = Graph::new(Csr::from_edges(1, &[]));
        let d = DistArray::new(1);
        d.store_dist(0, 3);
        assert!(matches!(
            check_dists(&g, &d, 0),
            Err(VerifyError::NonZeroSource { .. })
        ));
    }

    #[test]
    fn counts_unvisited() {
        let g = Graph::new(Csr::from_edges(3, &[(0, 1, 1)]));
        let d = DistArray::new(3);
        d.store_dist(0, 0);
        d.store_dist(1, 1);
        let summary = check_dists(&g, &d, 0).unwrap();
        assert_eq!(summary.unvisited, 1);
    }
}

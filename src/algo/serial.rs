//! Serial reference shortest path.
//!
//! An ordered-set Dijkstra with lazy deletion: requests are inserted
//! without removing superseded ones, and a popped request only settles its
//! node if it is the first (smallest) to arrive. Used by tests and by the
//! scheduler-independent verification path; never by the parallel drivers.

use std::collections::BTreeSet;

use crate::graph::node::DIST_INFINITY;
use crate::graph::{Graph, NodeId};

/// Shortest distances from `source` to every node.
pub fn dijkstra(graph: &Graph, source: NodeId) -> Vec<u32> {
    let n = graph.node_count();
    let mut dist = vec![DIST_INFINITY; n];
    let mut pending: BTreeSet<(u32, NodeId)> = BTreeSet::new();
    pending.insert((0, source));

    while let Some((d, node)) = pending.pop_first() {
        if d >= dist[node as usize] {
            continue;
        }
        dist[node as usize] = d;
        for (v, w) in graph.out_edges(node) {
            let nd = u64::from(d) + u64::from(w);
            if nd < u64::from(dist[v as usize]) && nd < u64::from(DIST_INFINITY) {
                pending.insert((nd as u32, v));
            }
        }
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Csr;

    #[test]
    fn line_and_diamond() {
        let g = Graph::new(Csr::from_edges(4, &[(0, 1, 1), (1, 2, 2), (2, 3, 4)]));
        assert_eq!(dijkstra(&g, 0), vec![0, 1, 3, 7]);

        let g = Graph::new(Csr::from_edges(
            4,
            &[(0, 1, 1), (0, 2, 10), (1, 3, 1), (2, 3, 1)],
        ));
        assert_eq!(dijkstra(&g, 0)[3], 2);
    }

    #[test]
    fn unreachable_nodes_stay_infinite() {
        let g = Graph::new(Csr::from_edges(3, &[(1, 2, 1)]));
        let d = dijkstra(&g, 0);
        assert_eq!(d[0], 0);
        assert_eq!(d[1], DIST_INFINITY);
        assert_eq!(d[2], DIST_INFINITY);
    }
}

//! Property tests: parallel relaxation agrees with reference solvers on
//! random graphs, across scheduler families.

use petgraph::graph::DiGraph;
use proptest::collection::vec;
use proptest::prelude::*;

use surge::algo::serial::dijkstra;
use surge::algo::sssp::Sssp;
use surge::exec::run_with_spec;
use surge::graph::node::{DistArray, DIST_INFINITY};
use surge::graph::{Csr, Graph, NodeId, Weight};
use surge::WorklistSpec;

fn run_sssp(graph: &Graph, source: NodeId, wl: &str, threads: usize) -> Vec<u32> {
    let dist = DistArray::new(graph.node_count());
    let op = Sssp::new(graph, &dist);
    let initial = op.seed(source);
    let spec = WorklistSpec::parse(wl, 4).expect("known worklist");
    run_with_spec::<16, _>(&spec, threads, initial, &op);
    (0..graph.node_count())
        .map(|n| dist.dist(n as NodeId))
        .collect()
}

/// Independent cross-check with petgraph's Dijkstra.
fn petgraph_dists(n: usize, edges: &[(NodeId, NodeId, Weight)], source: NodeId) -> Vec<u32> {
    let mut pg: DiGraph<(), u64> = DiGraph::new();
    let nodes: Vec<_> = (0..n).map(|_| pg.add_node(())).collect();
    for &(u, v, w) in edges {
        pg.add_edge(nodes[u as usize], nodes[v as usize], u64::from(w));
    }
    let result = petgraph::algo::dijkstra(&pg, nodes[source as usize], None, |e| *e.weight());
    (0..n)
        .map(|i| {
            result
                .get(&nodes[i])
                .map_or(DIST_INFINITY, |&d| d.min(u64::from(DIST_INFINITY)) as u32)
        })
        .collect()
}

fn arb_edges(n: usize) -> impl Strategy<Value = Vec<(NodeId, NodeId, Weight)>> {
    vec(
        (0..n as NodeId, 0..n as NodeId, 1..100u32),
        0..(n * 4).max(1),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn parallel_sssp_matches_both_references(
        edges in arb_edges(40),
        wl_pick in 0usize..6,
    ) {
        let n = 40;
        let wl = ["obim", "adap-obim", "smq_4_1", "mq2", "skiplist", "klsm256"][wl_pick];
        let graph = Graph::new(Csr::from_edges(n, &edges));
        let expect = dijkstra(&graph, 0);
        let cross = petgraph_dists(n, &edges, 0);
        prop_assert_eq!(&expect, &cross);
        let got = run_sssp(&graph, 0, wl, 4);
        prop_assert_eq!(&got, &expect);
    }

    #[test]
    fn seeding_never_exceeds_degree(edges in arb_edges(20)) {
        let graph = Graph::new(Csr::from_edges(20, &edges));
        let dist = DistArray::new(20);
        let op = Sssp::new(&graph, &dist);
        let initial = op.seed(0);
        prop_assert!(initial.len() <= graph.out_degree(0));
    }
}

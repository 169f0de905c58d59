//! Conservation and termination stress over the scheduler family.

use surge::algo::sssp::Sssp;
use surge::exec::run_with_spec;
use surge::graph::node::DistArray;
use surge::graph::{Csr, Graph, NodeId, Weight};
use surge::WorklistSpec;

/// Scenario: heavy fan-out star `0 -> k` for `k = 1..=1000` with equal
/// weights under many threads. Every dequeue is either productive or
/// stale; nothing may be lost.
fn star(k: u32) -> Graph {
    let edges: Vec<(NodeId, NodeId, Weight)> = (1..=k).map(|v| (0, v, 7)).collect();
    Graph::new(Csr::from_edges(k as usize + 1, &edges))
}

fn stress(wl: &str, threads: usize) {
    let graph = star(1000);
    let dist = DistArray::new(graph.node_count());
    let op = Sssp::new(&graph, &dist);
    let initial = op.seed(0);
    assert_eq!(initial.len(), 1000);

    let spec = WorklistSpec::parse(wl, 10).expect("known worklist");
    let report = run_with_spec::<64, _>(&spec, threads, initial, &op);

    // No loss: pushed = processed (productive + stale), pending 0.
    assert_eq!(report.stats.pushes, report.stats.pops, "{wl} lost items");
    assert_eq!(report.stats.pops, report.stats.nodes_processed, "{wl}");
    // Every leaf settled exactly once.
    for v in 1..=1000 {
        assert_eq!(dist.dist(v), 7, "{wl} left node {v} unsettled");
    }
}

#[test]
fn star_fanout_obim() {
    stress("obim", 16);
}

#[test]
fn star_fanout_adaptive_obim() {
    stress("adap-obim", 16);
}

#[test]
fn star_fanout_stealing() {
    stress("smq_2_16", 16);
}

#[test]
fn star_fanout_multiqueue() {
    stress("mq2", 16);
}

#[test]
fn star_fanout_heap_multiqueue() {
    stress("hmq4", 16);
}

#[test]
fn star_fanout_adaptive_multiqueue() {
    stress("amq2_5_1000_1_100", 16);
}

#[test]
fn star_fanout_exact_and_spray() {
    stress("skiplist", 16);
    stress("spraylist", 16);
}

#[test]
fn star_fanout_klsm() {
    stress("klsm256", 16);
}

#[test]
fn star_fanout_swarm() {
    stress("swarm", 16);
    stress("heapswarm", 16);
}

/// A long chain processed by many threads: most threads starve and sit in
/// the quiescence protocol while one relaxes; termination must still be
/// clean and exact.
#[test]
fn chain_starves_most_threads_but_terminates() {
    let n: u32 = 2000;
    let edges: Vec<(NodeId, NodeId, Weight)> = (0..n - 1).map(|u| (u, u + 1, 1)).collect();
    let graph = Graph::new(Csr::from_edges(n as usize, &edges));
    let dist = DistArray::new(graph.node_count());
    let op = Sssp::new(&graph, &dist);
    let initial = op.seed(0);
    let spec = WorklistSpec::parse("obim", 3).unwrap();
    let report = run_with_spec::<64, _>(&spec, 8, initial, &op);
    assert_eq!(report.stats.pushes, report.stats.pops);
    assert_eq!(dist.dist(n - 1), n - 1);
}

/// Two waves: a slow high-priority region and a later fast improvement
/// forces stale dequeues; the stale count must account for every pop that
/// was not productive work.
#[test]
fn stale_items_are_counted_not_reprocessed() {
    // Parallel paths of different lengths into a shared fan-out.
    let mut edges: Vec<(NodeId, NodeId, Weight)> = vec![(0, 1, 100), (0, 2, 1), (2, 1, 1)];
    for v in 3..200 {
        edges.push((1, v, 1));
    }
    let graph = Graph::new(Csr::from_edges(200, &edges));
    let dist = DistArray::new(graph.node_count());
    let op = Sssp::new(&graph, &dist);
    let initial = op.seed(0);
    let spec = WorklistSpec::parse("obim", 0).unwrap();
    // Single worker: buckets drain lowest-first, so the improvement through
    // node 2 lands before the direct push at distance 100 is dequeued.
    let report = run_with_spec::<64, _>(&spec, 1, initial, &op);
    assert_eq!(dist.dist(1), 2);
    for v in 3..200 {
        assert_eq!(dist.dist(v), 3);
    }
    assert_eq!(report.stats.pushes, report.stats.pops);
    assert!(report.stats.n_empty >= 1);
}

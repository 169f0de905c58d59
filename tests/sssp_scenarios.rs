use surge::algo::serial::dijkstra;
use surge::algo::sssp::Sssp;
use surge::algo::verify::check_dists;
use surge::exec::run_with_spec;
use surge::graph::node::DistArray;
use surge::graph::{Csr, Graph, NodeId, Weight};
use surge::WorklistSpec;

fn run_sssp(
    graph: &Graph,
    source: NodeId,
    wl: &str,
    delta: u32,
    threads: usize,
) -> Vec<u32> {
    let dist = DistArray::new(graph.node_count());
    let op = Sssp::new(graph, &dist);
    let initial = op.seed(source);
    let spec = WorklistSpec::parse(wl, delta).expect("known worklist");
    let report = run_with_spec::<64, _>(&spec, threads, initial, &op);
    assert_eq!(
        report.stats.pushes, report.stats.pops,
        "push/pop conservation violated by {wl}"
    );
    check_dists(graph, &dist, source).expect("consistent distances");
    (0..graph.node_count())
        .map(|n| dist.dist(n as NodeId))
        .collect()
}

#[test]
fn line_graph_distances() {
    let g = Graph::new(Csr::from_edges(4, &[(0, 1, 1), (1, 2, 2), (2, 3, 4)]));
    assert_eq!(run_sssp(&g, 0, "obim", 10, 2), vec![0, 1, 3, 7]);
}

#[test]
fn diamond_prefers_short_side() {
    let g = Graph::new(Csr::from_edges(
        4,
        &[(0, 1, 1), (0, 2, 10), (1, 3, 1), (2, 3, 1)],
    ));
    assert_eq!(run_sssp(&g, 0, "obim", 10, 2)[3], 2);
}

#[test]
fn cycle_terminates_without_spinning() {
    let g = Graph::new(Csr::from_edges(3, &[(0, 1, 1), (1, 2, 1), (2, 0, 1)]));
    assert_eq!(run_sssp(&g, 0, "obim", 10, 4), vec![0, 1, 2]);
}

/// A mid-sized deterministic graph exercising contention: a layered mesh
/// with skip edges and varied weights.
fn mesh(layers: u32, width: u32) -> (Graph, usize) {
    let n = (layers * width) as usize;
    let mut edges: Vec<(NodeId, NodeId, Weight)> = Vec::new();
    for l in 0..layers - 1 {
        for i in 0..width {
            let u = l * width + i;
            for j in 0..width {
                let v = (l + 1) * width + j;
                let w = 1 + ((u * 31 + v * 17) % 9);
                edges.push((u, v, w));
            }
        }
    }
    // Skip edges two layers ahead keep several buckets alive at once.
    for l in 0..layers.saturating_sub(2) {
        for i in 0..width {
            let u = l * width + i;
            let v = (l + 2) * width + i;
            edges.push((u, v, 3 + (u % 13)));
        }
    }
    (Graph::new(Csr::from_edges(n, &edges)), n)
}

#[test]
fn matches_reference_dijkstra_on_a_mesh() {
    let (g, _) = mesh(12, 8);
    let expect = dijkstra(&g, 0);
    assert_eq!(run_sssp(&g, 0, "obim", 4, 4), expect);
}

#[test]
fn delta_does_not_change_results() {
    let (g, _) = mesh(10, 6);
    let expect = dijkstra(&g, 0);
    for delta in [1, 2, 5, 8, 12, 16, 20] {
        assert_eq!(
            run_sssp(&g, 0, "obim", delta, 4),
            expect,
            "delta {delta} changed the distances"
        );
    }
}

#[test]
fn every_scheduler_family_agrees() {
    let (g, _) = mesh(10, 6);
    let expect = dijkstra(&g, 0);
    for wl in [
        "obim",
        "adap-obim",
        "smq_8_1",
        "smq_4_1",
        "smq_8_8",
        "smq_2_16",
        "mq1",
        "mq2",
        "mq4",
        "hmq1",
        "hmq2",
        "hmq4",
        "amq2",
        "amq2_5_1000_1_100",
        "skiplist",
        "spraylist",
        "klsm256",
        "klsm16k",
        "swarm",
        "heapswarm",
        "pq",
    ] {
        assert_eq!(run_sssp(&g, 0, wl, 10, 4), expect, "worklist {wl} disagrees");
    }
}

#[test]
fn repeated_runs_are_identical() {
    // The schedule is nondeterministic; the fixed point is not.
    let (g, _) = mesh(8, 8);
    let first = run_sssp(&g, 0, "smq_8_8", 10, 4);
    for _ in 0..3 {
        assert_eq!(run_sssp(&g, 0, "smq_8_8", 10, 4), first);
    }
}

use surge::algo::pagerank::{PageRank, ALPHA};
use surge::exec::run_with_spec;
use surge::graph::node::RankArray;
use surge::graph::{Csr, Graph};
use surge::WorklistSpec;

fn two_disconnected_triangles() -> Graph {
    let forward = Csr::from_adjacency(&[
        vec![1],
        vec![2],
        vec![0],
        vec![4],
        vec![5],
        vec![3],
    ]);
    let reverse = forward.transpose();
    Graph::with_transpose(forward, reverse)
}

fn run_pagerank(graph: &Graph, wl: &str, tolerance: f32, threads: usize) -> (RankArray, bool) {
    let ranks = RankArray::new(graph.node_count(), 1.0 - ALPHA);
    let broke = {
        let op = PageRank::new(graph, &ranks, tolerance, 100.0, false, 100);
        let initial = op.seed();
        let spec = WorklistSpec::parse(wl, 0).expect("known worklist");
        run_with_spec::<32, _>(&spec, threads, initial, &op).broke
    };
    (ranks, broke)
}

#[test]
fn disconnected_cycles_converge_to_uniform_ranks() {
    let graph = two_disconnected_triangles();
    let (ranks, broke) = run_pagerank(&graph, "obim", 1e-6, 2);
    assert!(!broke);
    assert!(ranks.max_residual() < 1e-6);

    let total: f32 = (0..6).map(|v| ranks.value(v)).sum();
    for v in 0..6 {
        let normalized = ranks.value(v) / total;
        assert!(
            (normalized - 1.0 / 6.0).abs() < 1e-4,
            "node {v} off uniform: {normalized}"
        );
    }
}

#[test]
fn scheduler_choice_does_not_change_the_fixed_point() {
    let graph = two_disconnected_triangles();
    let (reference, _) = run_pagerank(&graph, "obim", 1e-6, 2);
    for wl in ["adap-obim", "smq_8_1", "mq2", "skiplist", "klsm256"] {
        let (ranks, broke) = run_pagerank(&graph, wl, 1e-6, 2);
        assert!(!broke, "{wl} hit the cap");
        for v in 0..6 {
            assert!(
                (ranks.value(v) - reference.value(v)).abs() < 1e-3,
                "{wl} disagrees at node {v}"
            );
        }
    }
}

#[test]
fn star_converges_with_hub_bias() {
    // A hub pointed at by many leaves; the leaves also receive an edge back
    // so every node has in- and out-degree.
    let n = 50;
    let mut adjacency = vec![Vec::new(); n];
    for leaf in 1..n {
        adjacency[leaf].push(0);
        adjacency[0].push(leaf as u32);
    }
    let forward = Csr::from_adjacency(&adjacency);
    let reverse = forward.transpose();
    let graph = Graph::with_transpose(forward, reverse);

    let (ranks, broke) = run_pagerank(&graph, "obim", 1e-4, 4);
    assert!(!broke);
    assert!(ranks.max_residual() < 1e-4);
    // The hub must outrank every leaf.
    let hub = ranks.value(0);
    for v in 1..n as u32 {
        assert!(hub > ranks.value(v));
    }
}

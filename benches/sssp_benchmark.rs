use criterion::{criterion_group, criterion_main, Criterion};

use surge::algo::sssp::Sssp;
use surge::exec::run_with_spec;
use surge::graph::node::DistArray;
use surge::graph::{Csr, Graph, NodeId, Weight};
use surge::WorklistSpec;

/// A layered mesh with skip edges, the shape that keeps several priority
/// buckets populated at once.
fn mesh(layers: u32, width: u32) -> Graph {
    let n = (layers * width) as usize;
    let mut edges: Vec<(NodeId, NodeId, Weight)> = Vec::new();
    for l in 0..layers - 1 {
        for i in 0..width {
            let u = l * width + i;
            for j in 0..width {
                let v = (l + 1) * width + j;
                edges.push((u, v, 1 + ((u * 31 + v * 17) % 9)));
            }
        }
    }
    Graph::new(Csr::from_edges(n, &edges))
}

fn bench_sssp(c: &mut Criterion) {
    let graph = mesh(64, 16);
    let mut group = c.benchmark_group("sssp_mesh");
    group.sample_size(10);

    for (name, wl) in [
        ("obim", "obim"),
        ("adap-obim", "adap-obim"),
        ("smq_8_8", "smq_8_8"),
        ("mq2", "mq2"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let dist = DistArray::new(graph.node_count());
                let op = Sssp::new(&graph, &dist);
                let initial = op.seed(0);
                let spec = WorklistSpec::parse(wl, 10).unwrap();
                run_with_spec::<64, _>(&spec, 4, initial, &op)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sssp);
criterion_main!(benches);

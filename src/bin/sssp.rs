//! SSSP driver: chaotic-iteration shortest paths over a chosen scheduler.

use std::process::ExitCode;

use anyhow::{anyhow, Context as _};
use clap::Parser;
use tracing::{error, info, warn};

use surge::algo::sssp::Sssp;
use surge::algo::verify::check_dists;
use surge::cli::{self, GraphArgs, RunArgs, EXIT_INPUT, EXIT_VERIFY};
use surge::exec::run_with_spec;
use surge::graph::io::load_graph;
use surge::graph::node::DistArray;
use surge::report::{self, JsonReport, RunRecord};
use surge::WorklistSpec;

/// Chunk capacity for the chunked-bag schedulers.
const CHUNK_SIZE: usize = 64;

#[derive(Parser, Debug)]
#[command(
    name = "sssp",
    about = "Computes shortest paths from a source node to all nodes in a directed graph \
             using a modified chaotic iteration algorithm"
)]
struct Cli {
    #[command(flatten)]
    graph: GraphArgs,

    #[command(flatten)]
    run: RunArgs,

    /// Node to start the search from.
    #[arg(long = "startNode", default_value_t = 0)]
    start_node: u32,

    /// Node to report the distance to.
    #[arg(long = "reportNode", default_value_t = 1)]
    report_node: u32,

    /// Shift value for the delta-step buckets.
    #[arg(long, default_value_t = 10)]
    delta: u32,
}

fn main() -> ExitCode {
    cli::init_tracing();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(EXIT_INPUT as u8)
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let graph = load_graph(
        &cli.graph.graph,
        cli.graph.graph_transpose.as_deref(),
        cli.graph.symmetric_graph,
    )?;
    let nodes = graph.node_count();
    info!(nodes, edges = graph.edge_count(), "graph loaded");

    let source = cli::check_node("source", cli.start_node, nodes)?;
    let report_node = cli::check_node("report", cli.report_node, nodes)?;
    anyhow::ensure!(cli.delta < 64, "delta shift {} out of range", cli.delta);
    let spec = WorklistSpec::parse(&cli.run.wl, cli.delta)
        .ok_or_else(|| anyhow!("unknown worklist {:?}", cli.run.wl))?;
    let threads = cli.run.thread_count();

    info!(
        delta = cli.delta,
        width = 1u64.checked_shl(cli.delta).unwrap_or(u64::MAX),
        "using delta-step buckets"
    );
    warn!("performance varies considerably with the delta parameter; do not expect the default to fit every graph");

    let dist = DistArray::new(nodes);
    let op = Sssp::new(&graph, &dist);
    let initial = op.seed(source);
    let outcome = run_with_spec::<CHUNK_SIZE, _>(&spec, threads, initial, &op);

    info!(
        node = report_node,
        dist = dist.dist(report_node),
        elapsed_ms = outcome.elapsed.as_millis(),
        nodes_processed = outcome.stats.nodes_processed,
        "run complete"
    );

    if !cli.run.noverify {
        match check_dists(&graph, &dist, source) {
            Ok(summary) => {
                if summary.unvisited > 0 {
                    warn!(
                        unvisited = summary.unvisited,
                        "unvisited nodes; this is an error if the graph is strongly connected"
                    );
                }
                info!(max_dist = summary.max_dist, "verification successful");
            }
            Err(err) => {
                error!("verification failed: {err}");
                return Ok(ExitCode::from(EXIT_VERIFY as u8));
            }
        }
    }

    let delta = spec.reports_delta().then_some(cli.delta);
    report::append_result(
        &cli.run.result_file,
        &cli.run.suff,
        &RunRecord {
            wl: &cli.run.wl,
            nodes_processed: outcome.stats.nodes_processed,
            threads,
            delta,
            elapsed: outcome.elapsed,
        },
    )
    .context("failed to append to the result file")?;

    if let Some(path) = &cli.run.json_stats {
        report::write_json_stats(
            path,
            &JsonReport {
                wl: report::wl_label(&cli.run.wl, &cli.run.suff),
                threads,
                delta,
                elapsed_ms: outcome.elapsed.as_millis(),
                stats: &outcome.stats,
            },
        )
        .context("failed to write the JSON stats file")?;
    }

    Ok(ExitCode::SUCCESS)
}

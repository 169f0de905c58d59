//! PageRank driver: residual-prioritized asynchronous page rank.

use std::process::ExitCode;

use anyhow::{anyhow, Context as _};
use clap::Parser;
use tracing::{error, info, warn};

use surge::algo::pagerank::{top_ranks, PageRank, ALPHA};
use surge::cli::{self, GraphArgs, RunArgs, EXIT_INPUT, EXIT_VERIFY};
use surge::exec::run_with_spec;
use surge::graph::io::load_graph;
use surge::graph::node::RankArray;
use surge::report::{self, JsonReport, RunRecord};
use surge::WorklistSpec;

/// Chunk capacity for the chunked-bag schedulers. PageRank items are
/// heavier than distance requests, so the bags run smaller chunks.
const CHUNK_SIZE: usize = 32;

#[derive(Parser, Debug)]
#[command(
    name = "pagerank",
    about = "Computes page ranks a la Page and Brin, prioritized by degree-biased residuals"
)]
struct Cli {
    #[command(flatten)]
    graph: GraphArgs,

    #[command(flatten)]
    run: RunArgs,

    /// Convergence tolerance on node residuals.
    #[arg(long, default_value_t = 0.01)]
    tolerance: f32,

    /// Priority amplification for the residual bias.
    #[arg(long, default_value_t = 100.0)]
    amp: f32,

    /// Base the priority degree on out-degree only.
    #[arg(long = "outdeg")]
    out_only: bool,

    /// Maximum iterations (productive applications per node on average).
    #[arg(long = "maxIterations", default_value_t = 100)]
    max_iterations: u64,

    /// Shift value for the priority buckets.
    #[arg(long, default_value_t = 0)]
    delta: u32,

    /// Ranked nodes to print after the run.
    #[arg(long = "topn", default_value_t = 10)]
    topn: usize,
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
    if cli.graph.graph_transpose.is_none() && !cli.graph.symmetric_graph {
        return Err(anyhow!(
            "pagerank pulls from in-neighbors; pass the precomputed transpose through \
             --graphTranspose (or --symmetricGraph)"
        ));
    }
    let graph = load_graph(
        &cli.graph.graph,
        cli.graph.graph_transpose.as_deref(),
        cli.graph.symmetric_graph,
    )?;
    let nodes = graph.node_count();
    info!(nodes, edges = graph.edge_count(), "graph loaded");

    anyhow::ensure!(cli.delta < 64, "delta shift {} out of range", cli.delta);
    let spec = WorklistSpec::parse(&cli.run.wl, cli.delta)
        .ok_or_else(|| anyhow!("unknown worklist {:?}", cli.run.wl))?;
    let threads = cli.run.thread_count();
    info!(
        tolerance = cli.tolerance,
        amp = cli.amp,
        out_only = cli.out_only,
        "residual-priority configuration"
    );

    let ranks = RankArray::new(nodes, 1.0 - ALPHA);
    let op = PageRank::new(
        &graph,
        &ranks,
        cli.tolerance,
        cli.amp,
        cli.out_only,
        cli.max_iterations,
    );
    let initial = op.seed();
    let outcome = run_with_spec::<CHUNK_SIZE, _>(&spec, threads, initial, &op);

    info!(
        elapsed_ms = outcome.elapsed.as_millis(),
        nodes_processed = outcome.stats.nodes_processed,
        productive = op.productive(),
        broke = outcome.broke,
        "run complete"
    );
    for (rank, (node, value)) in top_ranks(&ranks, cli.topn).into_iter().enumerate() {
        info!(rank = rank + 1, node, value, "page rank");
    }

    if !cli.run.noverify && !outcome.broke {
        let max_residual = ranks.max_residual();
        if max_residual >= cli.tolerance {
            error!(
                max_residual,
                tolerance = cli.tolerance,
                "verification failed: residual mass above tolerance after quiescence"
            );
            return Ok(ExitCode::from(EXIT_VERIFY as u8));
        }
        info!(max_residual, "verification successful");
    } else if outcome.broke {
        warn!("iteration cap reached; results are best-effort");
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

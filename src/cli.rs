//! Shared pieces of the three driver binaries.
//!
//! Flag names follow the established drivers (`--startNode`, `--wl`,
//! `--resultFile`, ...) so existing sweep scripts keep working. Exit codes:
//! 0 on success, 1 on verification failure, 2 on input errors.

use std::path::PathBuf;

use clap::Args;
use tracing_subscriber::EnvFilter;

/// Graph input selection, common to all drivers.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Input graph (binary CSR).
    pub graph: PathBuf,

    /// Transpose of the input graph (binary CSR).
    #[arg(long = "graphTranspose")]
    pub graph_transpose: Option<PathBuf>,

    /// The input graph is symmetric.
    #[arg(long = "symmetricGraph")]
    pub symmetric_graph: bool,
}

/// Run configuration, common to all drivers.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Worklist to use.
    #[arg(long, default_value = "obim")]
    pub wl: String,

    /// Active worker threads (defaults to the available parallelism).
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Result file name for experiment output.
    #[arg(long = "resultFile", default_value = "result.txt")]
    pub result_file: String,

    /// Suffix for the result file and tuned worklist labels.
    #[arg(long, default_value = "")]
    pub suff: String,

    /// Skip the consistency check.
    #[arg(long)]
    pub noverify: bool,

    /// Write aggregated run statistics as JSON.
    #[arg(long = "jsonStats")]
    pub json_stats: Option<PathBuf>,
}

impl RunArgs {
    /// Worker thread count to run with.
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

/// Exit code for input errors (unreadable graph, bad nodes, unknown flags'
/// values).
pub const EXIT_INPUT: i32 = 2;
/// Exit code for a failed consistency check.
pub const EXIT_VERIFY: i32 = 1;

/// Installs the tracing subscriber for a driver binary. `RUST_LOG`
/// overrides the default `info` level.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Validates that a node id is inside the graph.
pub fn check_node(label: &str, node: u32, nodes: usize) -> anyhow::Result<u32> {
    anyhow::ensure!(
        (node as usize) < nodes,
        "failed to set {label}: node {node} out of range (graph has {nodes} nodes)"
    );
    Ok(node)
}

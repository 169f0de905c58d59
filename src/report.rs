//! Run result persistence.
//!
//! Every run appends two lines to the result file: the elapsed time of the
//! parallel phase, then `<wl>,<nodesProcessed>,<threads>[,<delta>]` (the
//! delta column only for the OBIM family). A `--suff` suffix is spliced
//! into both the file name and the reported name of the tuned multi-queue
//! families, so parameter sweeps append to distinct files under distinct
//! labels. Optionally the full aggregated counters go to a JSON file.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::exec::RunStats;

/// One run, ready to be appended to the result file.
pub struct RunRecord<'a> {
    /// Worklist name as selected (before suffixing).
    pub wl: &'a str,
    /// Applications performed.
    pub nodes_processed: u64,
    /// Worker threads.
    pub threads: usize,
    /// Delta shift, for the engines that report it.
    pub delta: Option<u32>,
    /// Wall-clock time of the parallel phase.
    pub elapsed: Duration,
}

/// Result file name with the suffix spliced in (`result.txt` + `sweep`
/// becomes `result.txt_sweep`).
pub fn suffixed_path(base: &str, suff: &str) -> String {
    if suff.is_empty() {
        base.to_owned()
    } else {
        format!("{base}_{suff}")
    }
}

/// Worklist label with the suffix spliced in for the tuned families
/// (`smq*`/`amq*`), unchanged otherwise.
pub fn wl_label(wl: &str, suff: &str) -> String {
    let tuned = wl.starts_with("smq") || wl.starts_with("amq");
    if tuned && !suff.is_empty() {
        format!("{wl}_{suff}")
    } else {
        wl.to_owned()
    }
}

/// Appends the two report lines for a finished run.
pub fn append_result(base: &str, suff: &str, record: &RunRecord<'_>) -> io::Result<()> {
    let path = suffixed_path(base, suff);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{:.3}", record.elapsed.as_secs_f64())?;
    match record.delta {
        Some(delta) => writeln!(
            file,
            "{},{},{},{}",
            wl_label(record.wl, suff),
            record.nodes_processed,
            record.threads,
            delta
        )?,
        None => writeln!(
            file,
            "{},{},{}",
            wl_label(record.wl, suff),
            record.nodes_processed,
            record.threads
        )?,
    }
    Ok(())
}

/// Machine-readable dump of a finished run.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    /// Worklist label (suffixed).
    pub wl: String,
    /// Worker threads.
    pub threads: usize,
    /// Delta shift, when the engine reports one.
    pub delta: Option<u32>,
    /// Elapsed milliseconds of the parallel phase.
    pub elapsed_ms: u128,
    /// Aggregated counters.
    pub stats: &'a RunStats,
}

/// Writes the JSON stats dump.
pub fn write_json_stats(path: &Path, report: &JsonReport<'_>) -> io::Result<()> {
    let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_splicing() {
        assert_eq!(suffixed_path("result.txt", ""), "result.txt");
        assert_eq!(suffixed_path("result.txt", "v2"), "result.txt_v2");
        assert_eq!(wl_label("obim", "v2"), "obim");
        assert_eq!(wl_label("smq_8_1", "v2"), "smq_8_1_v2");
        assert_eq!(wl_label("amq2", "v2"), "amq2_v2");
    }

    #[test]
    fn appends_csv_lines() {
        let dir = std::env::temp_dir().join("surge-report-test");
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("result.txt");
        let base = base.to_str().unwrap();
        let _ = std::fs::remove_file(base);

        let record = RunRecord {
            wl: "obim",
            nodes_processed: 1234,
            threads: 8,
            delta: Some(10),
            elapsed: Duration::from_millis(1500),
        };
        append_result(base, "", &record).unwrap();
        let text = std::fs::read_to_string(base).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "1.500");
        assert_eq!(lines[1], "obim,1234,8,10");

        let record = RunRecord {
            wl: "mq2",
            nodes_processed: 99,
            threads: 4,
            delta: None,
            elapsed: Duration::from_millis(250),
        };
        append_result(base, "", &record).unwrap();
        let text = std::fs::read_to_string(base).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert_eq!(text.lines().last().unwrap(), "mq2,99,4");
    }
}

//! On-disk graph formats.
//!
//! The binary format is the `.gr` v1 layout: a header of four little-endian
//! `u64`s (`version`, `edge_data_size`, `num_nodes`, `num_edges`), then
//! `num_nodes` end-offsets (`u64`), then `num_edges` targets (`u32`), then
//! 4 bytes of padding when `num_edges` is odd, then `num_edges` `u32`
//! weights when `edge_data_size == 4`.
//!
//! Coordinates for A* come from a text file with lines `v <id> <x> <y>`
//! (integers in micro-degrees); any line not starting with `v` is skipped.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use zerocopy::byteorder::{LittleEndian, U32, U64};
use zerocopy::{FromBytes, FromZeroes, Ref, Unaligned};

use crate::graph::{Csr, Graph, NodeId};

/// Errors raised while loading graph inputs.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The file could not be read at all.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is too short to hold the structure its header promises.
    #[error("{path}: truncated or malformed graph file")]
    Truncated {
        /// Offending path.
        path: PathBuf,
    },
    /// Unknown format version.
    #[error("{path}: unsupported graph version {version} (expected 1)")]
    UnsupportedVersion {
        /// Offending path.
        path: PathBuf,
        /// Version found in the header.
        version: u64,
    },
    /// Edge payloads of this width are not understood.
    #[error("{path}: unsupported edge data size {size} (expected 0 or 4)")]
    UnsupportedEdgeSize {
        /// Offending path.
        path: PathBuf,
        /// Edge data size found in the header.
        size: u64,
    },
    /// An edge target exceeds the declared node count.
    #[error("{path}: edge target {target} out of range (graph has {nodes} nodes)")]
    TargetOutOfRange {
        /// Offending path.
        path: PathBuf,
        /// The bad target.
        target: u64,
        /// Declared node count.
        nodes: u64,
    },
    /// The transpose disagrees with the forward graph.
    #[error("transpose has {transpose_nodes} nodes / {transpose_edges} edges, graph has {nodes} / {edges}")]
    TransposeMismatch {
        /// Forward node count.
        nodes: usize,
        /// Forward edge count.
        edges: usize,
        /// Transpose node count.
        transpose_nodes: usize,
        /// Transpose edge count.
        transpose_edges: usize,
    },
    /// A `v` line in the coordinate file did not parse.
    #[error("{path}:{line}: malformed coordinate line")]
    CoordSyntax {
        /// Offending path.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
    },
    /// A coordinate line names a node the graph does not have.
    #[error("{path}:{line}: coordinate for node {id} out of range (graph has {nodes} nodes)")]
    CoordOutOfRange {
        /// Offending path.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// The bad node id.
        id: u64,
        /// Graph node count.
        nodes: usize,
    },
}

#[derive(FromZeroes, FromBytes, Unaligned)]
#[repr(C)]
struct GrHeader {
    version: U64<LittleEndian>,
    edge_size: U64<LittleEndian>,
    num_nodes: U64<LittleEndian>,
    num_edges: U64<LittleEndian>,
}

/// Reads a binary `.gr` v1 graph.
pub fn read_gr(path: &Path) -> Result<Csr, GraphError> {
    let bytes = fs::read(path).map_err(|source| GraphError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_gr(&bytes, path)
}

fn parse_gr(bytes: &[u8], path: &Path) -> Result<Csr, GraphError> {
    let truncated = || GraphError::Truncated {
        path: path.to_path_buf(),
    };

    let (header, rest) =
        Ref::<_, GrHeader>::new_unaligned_from_prefix(bytes).ok_or_else(truncated)?;
    let version = header.version.get();
    if version != 1 {
        return Err(GraphError::UnsupportedVersion {
            path: path.to_path_buf(),
            version,
        });
    }
    let edge_size = header.edge_size.get();
    if edge_size != 0 && edge_size != 4 {
        return Err(GraphError::UnsupportedEdgeSize {
            path: path.to_path_buf(),
            size: edge_size,
        });
    }
    let num_nodes = header.num_nodes.get() as usize;
    let num_edges = header.num_edges.get() as usize;

    let (ends, rest) =
        Ref::<_, [U64<LittleEndian>]>::new_slice_unaligned_from_prefix(rest, num_nodes)
            .ok_or_else(truncated)?;
    let (targets_raw, rest) =
        Ref::<_, [U32<LittleEndian>]>::new_slice_unaligned_from_prefix(rest, num_edges)
            .ok_or_else(truncated)?;

    // Offsets on disk are end positions; prepend the implicit zero.
    let mut offsets = Vec::with_capacity(num_nodes + 1);
    offsets.push(0u64);
    let mut prev = 0u64;
    for end in ends.iter() {
        let end = end.get();
        if end < prev || end > num_edges as u64 {
            return Err(truncated());
        }
        offsets.push(end);
        prev = end;
    }
    if num_nodes > 0 && prev != num_edges as u64 {
        return Err(truncated());
    }

    let mut targets = Vec::with_capacity(num_edges);
    for t in targets_raw.iter() {
        let t = t.get();
        if t as usize >= num_nodes {
            return Err(GraphError::TargetOutOfRange {
                path: path.to_path_buf(),
                target: u64::from(t),
                nodes: num_nodes as u64,
            });
        }
        targets.push(t as NodeId);
    }

    let weights = if edge_size == 4 {
        // Targets occupy 4 * num_edges bytes; pad back to 8-byte alignment.
        let rest = if num_edges % 2 == 1 {
            rest.get(4..).ok_or_else(truncated)?
        } else {
            rest
        };
        let (weights_raw, _) =
            Ref::<_, [U32<LittleEndian>]>::new_slice_unaligned_from_prefix(rest, num_edges)
                .ok_or_else(truncated)?;
        weights_raw.iter().map(|w| w.get()).collect()
    } else {
        Vec::new()
    };

    Ok(Csr::from_parts(offsets, targets, weights))
}

/// Loads the forward graph and, depending on the flags, its transpose.
///
/// With `symmetric` the forward arrays double as the in-edge arrays; with a
/// `transpose` path the precomputed reverse graph is loaded and checked
/// against the forward one.
pub fn load_graph(
    path: &Path,
    transpose: Option<&Path>,
    symmetric: bool,
) -> Result<Graph, GraphError> {
    let forward = read_gr(path)?;
    if symmetric {
        return Ok(Graph::symmetric(forward));
    }
    match transpose {
        None => Ok(Graph::new(forward)),
        Some(tpath) => {
            let reverse = read_gr(tpath)?;
            if reverse.node_count() != forward.node_count()
                || reverse.edge_count() != forward.edge_count()
            {
                return Err(GraphError::TransposeMismatch {
                    nodes: forward.node_count(),
                    edges: forward.edge_count(),
                    transpose_nodes: reverse.node_count(),
                    transpose_edges: reverse.edge_count(),
                });
            }
            Ok(Graph::with_transpose(forward, reverse))
        }
    }
}

/// Node coordinates in micro-degrees, indexed by node id.
pub struct Coords {
    /// Latitude per node.
    pub x: Vec<i32>,
    /// Longitude per node.
    pub y: Vec<i32>,
}

/// Reads a `v <id> <x> <y>` coordinate file for a graph of `nodes` nodes.
///
/// Lines not starting with `v` are ignored. Nodes never mentioned keep
/// coordinates `(0, 0)`.
pub fn read_coords(path: &Path, nodes: usize) -> Result<Coords, GraphError> {
    let file = fs::File::open(path).map_err(|source| GraphError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut coords = Coords {
        x: vec![0; nodes],
        y: vec![0; nodes],
    };
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !line.starts_with('v') {
            continue;
        }
        let syntax = || GraphError::CoordSyntax {
            path: path.to_path_buf(),
            line: idx + 1,
        };
        let mut parts = line.split_whitespace();
        let _v = parts.next().ok_or_else(syntax)?;
        let id: u64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(syntax)?;
        let x: i32 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(syntax)?;
        let y: i32 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(syntax)?;
        if id as usize >= nodes {
            return Err(GraphError::CoordOutOfRange {
                path: path.to_path_buf(),
                line: idx + 1,
                id,
                nodes,
            });
        }
        coords.x[id as usize] = x;
        coords.y[id as usize] = y;
    }
    Ok(coords)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gr_bytes(nodes: &[u64], targets: &[u32], weights: Option<&[u32]>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1u64.to_le_bytes());
        out.extend_from_slice(&(if weights.is_some() { 4u64 } else { 0u64 }).to_le_bytes());
        out.extend_from_slice(&(nodes.len() as u64).to_le_bytes());
        out.extend_from_slice(&(targets.len() as u64).to_le_bytes());
        for end in nodes {
            out.extend_from_slice(&end.to_le_bytes());
        }
        for t in targets {
            out.extend_from_slice(&t.to_le_bytes());
        }
        if targets.len() % 2 == 1 {
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        if let Some(ws) = weights {
            for w in ws {
                out.extend_from_slice(&w.to_le_bytes());
            }
        }
        out
    }

    #[test]
    fn parses_weighted_gr() {
        // 0 -> 1 (w 3), 0 -> 2 (w 5), 2 -> 1 (w 7)
        let bytes = gr_bytes(&[2, 2, 3], &[1, 2, 1], Some(&[3, 5, 7]));
        let csr = parse_gr(&bytes, Path::new("test.gr")).unwrap();
        assert_eq!(csr.node_count(), 3);
        assert_eq!(csr.edge_count(), 3);
        assert_eq!(csr.edges(0).collect::<Vec<_>>(), vec![(1, 3), (2, 5)]);
        assert_eq!(csr.edges(2).collect::<Vec<_>>(), vec![(1, 7)]);
    }

    #[test]
    fn parses_unweighted_gr_with_even_edges() {
        let bytes = gr_bytes(&[1, 2], &[1, 0], None);
        let csr = parse_gr(&bytes, Path::new("test.gr")).unwrap();
        assert_eq!(csr.edges(0).collect::<Vec<_>>(), vec![(1, 1)]);
        assert_eq!(csr.edges(1).collect::<Vec<_>>(), vec![(0, 1)]);
    }

    #[test]
    fn rejects_bad_version() {
        let mut bytes = gr_bytes(&[0], &[], None);
        bytes[0] = 9;
        assert!(matches!(
            parse_gr(&bytes, Path::new("test.gr")),
            Err(GraphError::UnsupportedVersion { version: 9, .. })
        ));
    }

    #[test]
    fn rejects_truncated_file() {
        let bytes = gr_bytes(&[2, 2, 3], &[1, 2, 1], Some(&[3, 5, 7]));
        assert!(matches!(
            parse_gr(&bytes[..bytes.len() - 2], Path::new("test.gr")),
            Err(GraphError::Truncated { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_target() {
        let bytes = gr_bytes(&[1], &[5], None);
        assert!(matches!(
            parse_gr(&bytes, Path::new("test.gr")),
            Err(GraphError::TargetOutOfRange { target: 5, .. })
        ));
    }
}

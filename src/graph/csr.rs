//! Compact CSR (compressed sparse row) storage.
//!
//! CSR stores edges in row-major order: `offsets` has length `n + 1` and
//! `offsets[u]..offsets[u + 1]` indexes the out-edges of `u` in `targets`
//! (and `weights`, when the graph is weighted).
//!
//! [`Graph`] pairs a forward CSR with an optional transpose so that
//! pull-style operators (PageRank) can walk in-neighbors in O(in-degree)
//! instead of scanning every edge.

use crate::graph::{NodeId, Weight};

/// An immutable CSR graph.
pub struct Csr {
    offsets: Vec<u64>,
    targets: Vec<NodeId>,
    /// Empty for unweighted graphs; otherwise one weight per edge.
    weights: Vec<Weight>,
}

impl Csr {
    /// Builds a weighted CSR graph from an edge list.
    ///
    /// # Panics
    ///
    /// Panics if any endpoint is `>= n`.
    pub fn from_edges(n: usize, edges: &[(NodeId, NodeId, Weight)]) -> Self {
        let mut degree = vec![0u64; n];
        for &(u, v, _) in edges {
            assert!((u as usize) < n, "edge {u}->{v} is out of bounds for n={n}");
            assert!((v as usize) < n, "edge {u}->{v} is out of bounds for n={n}");
            degree[u as usize] += 1;
        }

        let mut offsets = Vec::with_capacity(n + 1);
        let mut total = 0u64;
        offsets.push(0);
        for d in &degree {
            total += d;
            offsets.push(total);
        }

        let mut cursor: Vec<u64> = offsets[..n].to_vec();
        let mut targets = vec![0 as NodeId; edges.len()];
        let mut weights = vec![0 as Weight; edges.len()];
        for &(u, v, w) in edges {
            let at = cursor[u as usize] as usize;
            targets[at] = v;
            weights[at] = w;
            cursor[u as usize] += 1;
        }

        Self {
            offsets,
            targets,
            weights,
        }
    }

    /// Builds an unweighted CSR graph from an adjacency list.
    ///
    /// # Panics
    ///
    /// Panics if any target is out of bounds.
    pub fn from_adjacency(adjacency: &[Vec<NodeId>]) -> Self {
        let n = adjacency.len();
        let mut offsets = Vec::with_capacity(n + 1);
        offsets.push(0);
        let mut total = 0u64;
        for nbrs in adjacency {
            total += nbrs.len() as u64;
            offsets.push(total);
        }
        let mut targets = Vec::with_capacity(total as usize);
        for (u, nbrs) in adjacency.iter().enumerate() {
            for &v in nbrs {
                assert!((v as usize) < n, "edge {u}->{v} is out of bounds for n={n}");
                targets.push(v);
            }
        }
        Self {
            offsets,
            targets,
            weights: Vec::new(),
        }
    }

    /// Builds a CSR graph directly from its parts.
    ///
    /// `weights` may be empty (unweighted graph) or `targets.len()` long.
    ///
    /// # Panics
    ///
    /// Panics if the offsets are not monotone, do not cover `targets`, or if
    /// any target is out of bounds.
    pub fn from_parts(offsets: Vec<u64>, targets: Vec<NodeId>, weights: Vec<Weight>) -> Self {
        assert!(!offsets.is_empty(), "offsets must have length n+1");
        let n = offsets.len() - 1;
        for w in offsets.windows(2) {
            assert!(w[0] <= w[1], "offsets must be monotone");
        }
        assert!(
            *offsets.last().unwrap() == targets.len() as u64,
            "offsets last must equal edge count"
        );
        assert!(
            weights.is_empty() || weights.len() == targets.len(),
            "weights must be empty or one per edge"
        );
        for &v in &targets {
            assert!((v as usize) < n, "edge to {v} out of bounds for n={n}");
        }
        Self {
            offsets,
            targets,
            weights,
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.targets.len()
    }

    /// Out-degree of `node`.
    #[inline]
    pub fn degree(&self, node: NodeId) -> usize {
        let n = node as usize;
        (self.offsets[n + 1] - self.offsets[n]) as usize
    }

    /// Out-neighbors of `node` with edge weights (1 when unweighted).
    pub fn edges(&self, node: NodeId) -> impl Iterator<Item = (NodeId, Weight)> + '_ {
        let n = node as usize;
        let start = self.offsets[n] as usize;
        let end = self.offsets[n + 1] as usize;
        (start..end).map(move |i| {
            let w = if self.weights.is_empty() {
                1
            } else {
                self.weights[i]
            };
            (self.targets[i], w)
        })
    }

    /// Out-neighbors of `node` without weights.
    pub fn targets(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let n = node as usize;
        let start = self.offsets[n] as usize;
        let end = self.offsets[n + 1] as usize;
        self.targets[start..end].iter().copied()
    }

    /// Builds the transpose (all edges reversed, weights carried over).
    pub fn transpose(&self) -> Csr {
        let n = self.node_count();
        let mut degree = vec![0u64; n];
        for &v in &self.targets {
            degree[v as usize] += 1;
        }
        let mut offsets = Vec::with_capacity(n + 1);
        let mut total = 0u64;
        offsets.push(0);
        for d in &degree {
            total += d;
            offsets.push(total);
        }
        let mut cursor: Vec<u64> = offsets[..n].to_vec();
        let mut targets = vec![0 as NodeId; self.targets.len()];
        let mut weights = if self.weights.is_empty() {
            Vec::new()
        } else {
            vec![0 as Weight; self.weights.len()]
        };
        for u in 0..n {
            let start = self.offsets[u] as usize;
            let end = self.offsets[u + 1] as usize;
            for i in start..end {
                let v = self.targets[i] as usize;
                let at = cursor[v] as usize;
                targets[at] = u as NodeId;
                if !weights.is_empty() {
                    weights[at] = self.weights[i];
                }
                cursor[v] += 1;
            }
        }
        Csr {
            offsets,
            targets,
            weights,
        }
    }
}

/// A forward CSR paired with optional in-neighbor access.
///
/// Operators that only push along out-edges (SSSP, A*) need just the forward
/// direction. PageRank pulls from in-neighbors, which requires either a
/// precomputed transpose or a symmetric graph.
pub struct Graph {
    forward: Csr,
    reverse: Option<Csr>,
    symmetric: bool,
}

impl Graph {
    /// Wraps a forward-only graph.
    pub fn new(forward: Csr) -> Self {
        Self {
            forward,
            reverse: None,
            symmetric: false,
        }
    }

    /// Wraps a graph together with its transpose.
    ///
    /// # Panics
    ///
    /// Panics if the transpose disagrees on node or edge counts.
    pub fn with_transpose(forward: Csr, reverse: Csr) -> Self {
        assert!(forward.node_count() == reverse.node_count());
        assert!(forward.edge_count() == reverse.edge_count());
        Self {
            forward,
            reverse: Some(reverse),
            symmetric: false,
        }
    }

    /// Wraps a symmetric graph: in-edges are served from the forward arrays.
    pub fn symmetric(forward: Csr) -> Self {
        Self {
            forward,
            reverse: None,
            symmetric: true,
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.forward.node_count()
    }

    /// Number of edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.forward.edge_count()
    }

    /// Whether in-neighbor queries are available.
    pub fn has_in_edges(&self) -> bool {
        self.symmetric || self.reverse.is_some()
    }

    /// Out-edges of `node` as `(target, weight)`.
    #[inline]
    pub fn out_edges(&self, node: NodeId) -> impl Iterator<Item = (NodeId, Weight)> + '_ {
        self.forward.edges(node)
    }

    /// Out-neighbors of `node` without weights.
    #[inline]
    pub fn out_targets(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.forward.targets(node)
    }

    /// Out-degree of `node`.
    #[inline]
    pub fn out_degree(&self, node: NodeId) -> usize {
        self.forward.degree(node)
    }

    /// In-neighbors of `node`.
    ///
    /// # Panics
    ///
    /// Panics if the graph has neither a transpose nor the symmetric flag.
    #[inline]
    pub fn in_targets(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let csr = if self.symmetric {
            &self.forward
        } else {
            self.reverse
                .as_ref()
                .expect("in-neighbor access requires a transpose or a symmetric graph")
        };
        csr.targets(node)
    }

    /// In-degree of `node`.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Graph::in_targets`].
    #[inline]
    pub fn in_degree(&self, node: NodeId) -> usize {
        let csr = if self.symmetric {
            &self.forward
        } else {
            self.reverse
                .as_ref()
                .expect("in-neighbor access requires a transpose or a symmetric graph")
        };
        csr.degree(node)
    }
}

//! # Undirected Multigraph
//!
//! Adjacency-list multigraph keyed by sparse integer vertex ids. Parallel
//! edges are stored as repeated adjacency entries; self-loops are rejected.
//!
//! The adjacency map is ordered, so every traversal over the graph (and every
//! algorithm built on top of it) visits vertices in ascending id order and is
//! reproducible from run to run.
//!
//! ```rust
//! use longtrail::graph::Multigraph;
//!
//! let mut g = Multigraph::new();
//! g.add_edge(0, 2);
//! g.add_edge(0, 2); // ignored, the edge already exists
//! g.insert_edge(0, 2); // parallel copy
//! assert_eq!(g.degree(0), 2);
//! assert_eq!(g.num_edges(), 2);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{GraphError, Result};

/// Vertex identifier from the grid addressing scheme.
pub type Vertex = i32;

/// Unordered vertex pair.
pub type Edge = (Vertex, Vertex);

/// Undirected multigraph. `w` appears in `adj[v]` exactly as many times as
/// `v` appears in `adj[w]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Multigraph {
    adj: BTreeMap<Vertex, Vec<Vertex>>,
    num_edges: usize,
}

impl Multigraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from an edge list, dropping duplicates.
    ///
    /// # Panics
    /// - if the list contains a self-loop
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = Edge>,
    {
        let mut g = Self::new();
        for (u, v) in edges {
            g.add_edge(u, v);
        }
        g
    }

    /// Registers `v` with an empty neighbor list if it is not present yet.
    pub fn add_vertex(&mut self, v: Vertex) {
        self.adj.entry(v).or_default();
    }

    /// Adds the edge `(u, v)` unless it already exists.
    /// Returns `true` if the edge was inserted.
    ///
    /// # Panics
    /// - if `u == v`
    pub fn add_edge(&mut self, u: Vertex, v: Vertex) -> bool {
        if self.has_edge(u, v) {
            return false;
        }
        self.insert_edge(u, v);
        true
    }

    /// Adds the edge `(u, v)` even if a copy already exists, creating a
    /// parallel edge.
    ///
    /// # Panics
    /// - if `u == v`
    pub fn insert_edge(&mut self, u: Vertex, v: Vertex) {
        assert!(u != v, "{}", GraphError::SelfLoop(u));
        self.adj.entry(u).or_default().push(v);
        self.adj.entry(v).or_default().push(u);
        self.num_edges += 1;
    }

    /// Removes one copy of the edge `(u, v)`. Both endpoints stay in the
    /// graph even if they become isolated.
    ///
    /// # Errors
    /// - `EdgeNotFound` if no copy of the edge exists; the graph is untouched
    pub fn remove_edge(&mut self, u: Vertex, v: Vertex) -> Result<()> {
        let pos_u = self
            .adj
            .get(&u)
            .and_then(|nbrs| nbrs.iter().position(|&w| w == v))
            .ok_or(GraphError::EdgeNotFound(u, v))?;
        let pos_v = self
            .adj
            .get(&v)
            .and_then(|nbrs| nbrs.iter().position(|&w| w == u))
            .ok_or_else(|| {
                GraphError::invariant(format!("adjacency of {v} is missing its copy of ({u}, {v})"))
            })?;

        if let Some(nbrs) = self.adj.get_mut(&u) {
            nbrs.remove(pos_u);
        }
        if let Some(nbrs) = self.adj.get_mut(&v) {
            nbrs.remove(pos_v);
        }
        self.num_edges -= 1;
        Ok(())
    }

    /// Returns `true` if at least one copy of `(u, v)` exists.
    #[must_use]
    pub fn has_edge(&self, u: Vertex, v: Vertex) -> bool {
        self.adj.get(&u).is_some_and(|nbrs| nbrs.contains(&v))
    }

    /// Number of edge copies between `u` and `v`.
    #[must_use]
    pub fn multiplicity(&self, u: Vertex, v: Vertex) -> usize {
        self.neighbors(u).iter().filter(|&&w| w == v).count()
    }

    #[must_use]
    pub fn contains_vertex(&self, v: Vertex) -> bool {
        self.adj.contains_key(&v)
    }

    /// Degree of `v`, counting parallel edges; 0 for unknown vertices.
    #[must_use]
    pub fn degree(&self, v: Vertex) -> usize {
        self.adj.get(&v).map_or(0, Vec::len)
    }

    /// Neighbors of `v` in insertion order, one entry per edge copy.
    #[must_use]
    pub fn neighbors(&self, v: Vertex) -> &[Vertex] {
        self.adj.get(&v).map(Vec::as_slice).unwrap_or_default()
    }

    /// All vertices, in ascending order.
    pub fn vertices(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.adj.keys().copied()
    }

    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.adj.len()
    }

    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// `true` if the graph has no edges (it may still hold isolated vertices).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_edges == 0
    }

    /// Every edge copy once, as `(u, v)` with `u < v`, in ascending order of `u`.
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::with_capacity(self.num_edges);
        for (&v, nbrs) in &self.adj {
            edges.extend(nbrs.iter().filter(|&&w| v < w).map(|&w| (v, w)));
        }
        edges
    }

    /// Verifies adjacency symmetry and the edge counter.
    ///
    /// # Errors
    /// - `InvariantViolation` describing the first mismatch found
    pub fn check_symmetry(&self) -> Result<()> {
        let mut total = 0;
        for (&v, nbrs) in &self.adj {
            total += nbrs.len();
            for &w in nbrs {
                if w == v {
                    return Err(GraphError::SelfLoop(v));
                }
                if self.multiplicity(v, w) != self.multiplicity(w, v) {
                    return Err(GraphError::invariant(format!(
                        "edge ({v}, {w}) has mismatched multiplicity"
                    )));
                }
            }
        }
        if total % 2 != 0 || total / 2 != self.num_edges {
            return Err(GraphError::invariant(format!(
                "adjacency length {total} does not match {} edges",
                self.num_edges
            )));
        }
        Ok(())
    }
}

impl FromIterator<Edge> for Multigraph {
    fn from_iter<I: IntoIterator<Item = Edge>>(iter: I) -> Self {
        Self::from_edges(iter)
    }
}

impl fmt::Display for Multigraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (v, nbrs)) in self.adj.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}: {nbrs:?}")?;
        }
        write!(f, "}}")
    }
}

//! Long trails: scoring, validation, and the engine that builds and improves
//! them.

pub mod cache;
pub mod expander;
pub mod longest;
pub mod odd_vertices;

use std::collections::HashMap;

use crate::graph::{Multigraph, Vertex};

pub use cache::{content_hash, LongestTrailCache};
pub use expander::{ExpansionStats, Expander};
pub use longest::TrailEngine;
pub use odd_vertices::{odd_vertices, OddVertexReducer, Reduction, ReductionStrategy};

/// Value of traversing an edge. Scores must be non-negative.
pub trait EdgeScore {
    fn score(&self, u: Vertex, v: Vertex) -> i64;
}

/// Every edge is worth one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitScore;

impl EdgeScore for UnitScore {
    fn score(&self, _u: Vertex, _v: Vertex) -> i64 {
        1
    }
}

impl<F> EdgeScore for F
where
    F: Fn(Vertex, Vertex) -> i64,
{
    fn score(&self, u: Vertex, v: Vertex) -> i64 {
        self(u, v)
    }
}

/// Grid-valued scoring: an edge jumps over the board cell halfway between its
/// endpoints and is worth that cell's value. Cells outside the board are
/// worth nothing.
#[derive(Debug, Clone, Default)]
pub struct CellValueScore {
    cells: Vec<i64>,
}

impl CellValueScore {
    #[must_use]
    pub fn new(cells: Vec<i64>) -> Self {
        Self { cells }
    }
}

impl EdgeScore for CellValueScore {
    fn score(&self, u: Vertex, v: Vertex) -> i64 {
        usize::try_from((i64::from(u) + i64::from(v)) / 2)
            .ok()
            .and_then(|cell| self.cells.get(cell))
            .map_or(0, |&value| value.max(0))
    }
}

/// Total score of the edges along `vertices`.
pub fn trail_score<S: EdgeScore + ?Sized>(score: &S, vertices: &[Vertex]) -> i64 {
    vertices.windows(2).map(|w| score.score(w[0], w[1])).sum()
}

/// `true` if `vertices` is a trail of `g` from `from` to `to`: the endpoints
/// match, consecutive vertices are adjacent, and no edge is used more often
/// than it occurs in `g`.
#[must_use]
pub fn is_path_in_graph(g: &Multigraph, from: Vertex, to: Vertex, vertices: &[Vertex]) -> bool {
    if vertices.first() != Some(&from) || vertices.last() != Some(&to) {
        return false;
    }
    if vertices.len() == 1 {
        return true;
    }
    let mut available: HashMap<(Vertex, Vertex), usize> = HashMap::new();
    for (u, v) in g.edges() {
        *available.entry((u, v)).or_default() += 1;
    }
    vertices.windows(2).all(|w| {
        let key = (w[0].min(w[1]), w[0].max(w[1]));
        match available.get_mut(&key) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    })
}

/// A best-effort trail.
///
/// A trail is `degraded` when some block could not be given an Euler-based
/// answer and fell back to a plain shortest path. Deadline expiry alone never
/// marks a trail degraded; every trail is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trail {
    vertices: Vec<Vertex>,
    degraded: bool,
}

impl Trail {
    #[must_use]
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self {
            vertices,
            degraded: false,
        }
    }

    #[must_use]
    pub fn degraded(vertices: Vec<Vertex>) -> Self {
        Self {
            vertices,
            degraded: true,
        }
    }

    /// The empty trail, returned when the target is unreachable.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[must_use]
    pub fn into_vertices(self) -> Vec<Vertex> {
        self.vertices
    }

    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.vertices.len().saturating_sub(1)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    #[must_use]
    pub fn first(&self) -> Option<Vertex> {
        self.vertices.first().copied()
    }

    #[must_use]
    pub fn last(&self) -> Option<Vertex> {
        self.vertices.last().copied()
    }

    /// Appends `other`, which must start where `self` ends.
    pub(crate) fn extend(&mut self, other: &Trail) {
        debug_assert_eq!(self.last(), other.first());
        self.vertices.extend_from_slice(other.vertices.get(1..).unwrap_or_default());
        self.degraded |= other.degraded;
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct TrailConfig {
    /// Seed of the Expander's root shuffle.
    pub seed: u64,
    /// Memoize block trails across calls.
    pub use_cache: bool,
    /// Improve block trails with the Expander.
    pub expand: bool,
    /// Share of the remaining budget granted to each expansion.
    pub expansion_fraction: f64,
    /// Cap on Expander outer passes per block.
    pub max_passes: Option<usize>,
    /// When building from a single start, also consider ending with a closed
    /// circuit inside a block.
    pub close_blocks: bool,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            use_cache: true,
            expand: true,
            expansion_fraction: 0.5,
            max_passes: None,
            close_blocks: true,
        }
    }
}

impl TrailConfig {
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    #[must_use]
    pub fn with_expansion(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    #[must_use]
    pub fn with_expansion_fraction(mut self, fraction: f64) -> Self {
        self.expansion_fraction = fraction;
        self
    }

    #[must_use]
    pub fn with_max_passes(mut self, max_passes: Option<usize>) -> Self {
        self.max_passes = max_passes;
        self
    }

    #[must_use]
    pub fn with_closed_blocks(mut self, close_blocks: bool) -> Self {
        self.close_blocks = close_blocks;
        self
    }
}

//! # Odd-Vertex Reduction
//!
//! A 2-edge-connected block admits an Euler trail from `from` to `to` only if
//! every vertex has even degree once the trail's own endpoints are credited
//! with one extra virtual incidence each. The vertices violating this are the
//! block's *odd vertices*; they always come in pairs.
//!
//! The reducer removes edges so that the odd vertices pair up:
//! 1. **Adjacent pairs.** An odd vertex with an odd neighbor loses the edge
//!    between them. One edge removed fixes two vertices.
//! 2. **Shortest paths.** The smallest remaining odd vertex is paired with
//!    the closest remaining odd vertex and the edges of a shortest path
//!    between them are removed. Interior vertices lose two incidences and
//!    keep their parity.
//!
//! Removal may cut the endpoints apart. The full reduction is then discarded
//! in favor of a single minimal step (adjacent pairs only, or else one path),
//! and if even that disconnects them the block has no Euler-based answer.
//! The pairing policy is a heuristic; it does not guarantee the fewest
//! removed edges.

use std::collections::BTreeSet;

use log::trace;

use crate::error::{GraphError, Result};
use crate::graph::{Edge, Multigraph, ShortestPaths, Vertex};
use crate::timing::Deadline;

/// Vertices of `g` with odd degree once `from` and `to` each get one extra
/// incidence, in ascending order.
#[must_use]
pub fn odd_vertices(g: &Multigraph, from: Vertex, to: Vertex) -> Vec<Vertex> {
    g.vertices()
        .filter(|&v| {
            let extra = usize::from(v == from) + usize::from(v == to);
            (g.degree(v) + extra) % 2 == 1
        })
        .collect()
}

/// Which removal policy produced a [`Reduction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionStrategy {
    /// Pairs every odd vertex.
    Full,
    /// A single step; odd vertices may remain.
    Minimal,
}

/// A block with edges removed so that its odd vertices pair up.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub graph: Multigraph,
    pub removed: Vec<Edge>,
    pub strategy: ReductionStrategy,
}

/// Trims a block toward Euler-trail constructibility between two endpoints.
#[derive(Debug, Clone, Copy)]
pub struct OddVertexReducer<'a> {
    block: &'a Multigraph,
    from: Vertex,
    to: Vertex,
}

impl<'a> OddVertexReducer<'a> {
    /// # Errors
    /// - `VertexNotFound` if either endpoint is not in the block
    pub fn new(block: &'a Multigraph, from: Vertex, to: Vertex) -> Result<Self> {
        for v in [from, to] {
            if !block.contains_vertex(v) {
                return Err(GraphError::VertexNotFound(v));
            }
        }
        Ok(Self { block, from, to })
    }

    #[must_use]
    pub fn odd_vertices(&self) -> Vec<Vertex> {
        odd_vertices(self.block, self.from, self.to)
    }

    /// Removes edges until no odd vertex is left, keeping the endpoints
    /// connected. Returns `None` if neither the full nor the minimal policy
    /// keeps them connected, if there is nothing to remove, or if `deadline`
    /// expires first. Callers tell the last case apart by polling `deadline`.
    ///
    /// # Errors
    /// Propagates graph errors, which indicate a broken invariant.
    pub fn reduce(&self, deadline: &Deadline) -> Result<Option<Reduction>> {
        let odd = self.odd_vertices();
        if odd.is_empty() {
            return Ok(None);
        }

        let Some(full) = self.full(odd.iter().copied().collect(), deadline)? else {
            trace!("deadline expired while pairing {} odd vertices", odd.len());
            return Ok(None);
        };
        if self.keeps_endpoints_connected(&full)? {
            return Ok(Some(full));
        }
        trace!(
            "full reduction removing {} edges cut {} from {}; trying one step",
            full.removed.len(),
            self.to,
            self.from
        );

        if deadline.expired() {
            return Ok(None);
        }
        let minimal = self.minimal(odd.into_iter().collect())?;
        if self.keeps_endpoints_connected(&minimal)? {
            return Ok(Some(minimal));
        }
        Ok(None)
    }

    /// `None` if `deadline` expires before every odd vertex is paired.
    fn full(
        &self,
        mut odd: BTreeSet<Vertex>,
        deadline: &Deadline,
    ) -> Result<Option<Reduction>> {
        let mut graph = self.block.clone();
        let mut removed = Vec::new();
        pair_adjacent(&mut graph, &mut odd, &mut removed)?;
        while !odd.is_empty() {
            if deadline.expired() {
                return Ok(None);
            }
            if !remove_closest_path(&mut graph, &mut odd, &mut removed)? {
                break;
            }
        }
        Ok(Some(Reduction {
            graph,
            removed,
            strategy: ReductionStrategy::Full,
        }))
    }

    fn minimal(&self, mut odd: BTreeSet<Vertex>) -> Result<Reduction> {
        let mut graph = self.block.clone();
        let mut removed = Vec::new();
        if pair_adjacent(&mut graph, &mut odd, &mut removed)? == 0 {
            remove_closest_path(&mut graph, &mut odd, &mut removed)?;
        }
        Ok(Reduction {
            graph,
            removed,
            strategy: ReductionStrategy::Minimal,
        })
    }

    fn keeps_endpoints_connected(&self, reduction: &Reduction) -> Result<bool> {
        if reduction.removed.is_empty() {
            return Ok(false);
        }
        Ok(ShortestPaths::new(&reduction.graph, self.from)?.is_reached(self.to))
    }
}

/// Removes one edge between each pair of adjacent odd vertices, scanning in
/// ascending order and pairing with the smallest odd neighbor. Returns the
/// number of edges removed.
fn pair_adjacent(
    g: &mut Multigraph,
    odd: &mut BTreeSet<Vertex>,
    removed: &mut Vec<Edge>,
) -> Result<usize> {
    let mut count = 0;
    let candidates: Vec<Vertex> = odd.iter().copied().collect();
    for u in candidates {
        if !odd.contains(&u) {
            continue;
        }
        let partner = g
            .neighbors(u)
            .iter()
            .copied()
            .filter(|w| *w != u && odd.contains(w))
            .min();
        if let Some(w) = partner {
            g.remove_edge(u, w)?;
            removed.push((u, w));
            odd.remove(&u);
            odd.remove(&w);
            count += 1;
        }
    }
    Ok(count)
}

/// Pairs the smallest odd vertex with its closest odd vertex and removes a
/// shortest path between them. Returns `false` if no other odd vertex is
/// reachable from it.
fn remove_closest_path(
    g: &mut Multigraph,
    odd: &mut BTreeSet<Vertex>,
    removed: &mut Vec<Edge>,
) -> Result<bool> {
    let Some(&u) = odd.iter().next() else {
        return Ok(false);
    };
    let sp = ShortestPaths::new(g, u)?;
    let closest = odd
        .iter()
        .copied()
        .filter(|&w| w != u)
        .filter_map(|w| sp.distance(w).map(|d| (d, w)))
        .min();
    let Some((_, w)) = closest else {
        return Ok(false);
    };

    let path = sp.path(w);
    for pair in path.windows(2) {
        g.remove_edge(pair[0], pair[1])?;
        removed.push((pair[0], pair[1]));
    }
    odd.remove(&u);
    odd.remove(&w);
    Ok(true)
}

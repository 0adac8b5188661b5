//! # Hierholzer's Algorithm for Euler Trails
//!
//! Builds an **Euler trail** between two given vertices of an undirected
//! multigraph: a walk from `from` to `to` that uses every edge exactly once.
//!
//! Such a trail exists iff the edges form one connected piece containing both
//! endpoints and every vertex has even degree, except that `from` and `to`
//! have odd degree when they differ.
//!
//! ## Steps
//! 1. Close the trail into a circuit with an auxiliary edge `(to, from)`. The
//!    auxiliary edge is never inserted into the graph; it only seeds the
//!    working circuit, which is a double-ended queue of edges.
//! 2. Repeatedly extend the circuit from its tail by consuming an unused edge
//!    incident to the tail vertex.
//! 3. When the tail vertex has no unused edges left the circuit is closed, so
//!    rotate it: move the head edge to the back and resume from the new tail.
//! 4. Once every edge is consumed, cut the circuit right after the auxiliary
//!    edge, yielding the open trail `from .. to`.
//!
//! ### Example
//! ```rust
//! use longtrail::graph::{euler_trail, Multigraph};
//!
//! let g: Multigraph = [(0, 1), (1, 2), (2, 3), (3, 0)].into_iter().collect();
//! let trail = euler_trail(&g, 0, 0).unwrap();
//! assert_eq!(trail, vec![0, 1, 2, 3, 0]);
//! ```

use std::collections::{HashSet, VecDeque};

use crate::error::{GraphError, Result};
use crate::graph::{Multigraph, Vertex};

/// A directed use of an edge in the working circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Step {
    from: Vertex,
    to: Vertex,
    auxiliary: bool,
}

/// Finds an Euler trail from `from` to `to`. The result has
/// `g.num_edges() + 1` vertices. An edgeless graph yields `[from]` when
/// `from == to`.
///
/// # Errors
/// Returns `Err` if:
/// - `from` or `to` is not a vertex of the graph (`VertexNotFound`)
/// - some vertex has the wrong degree parity (`NotEulerian`)
/// - the edges are not connected to `from` (`NotEulerian`)
pub fn euler_trail(g: &Multigraph, from: Vertex, to: Vertex) -> Result<Vec<Vertex>> {
    for v in [from, to] {
        if !g.contains_vertex(v) {
            return Err(GraphError::VertexNotFound(v));
        }
    }
    check_parity(g, from, to)?;
    if !check_connectivity(g, from, to) {
        return Err(GraphError::not_eulerian(format!(
            "edges are not connected to vertex {from}"
        )));
    }

    let mut work = g.clone();
    let total = g.num_edges() + 1;

    let mut circuit = VecDeque::with_capacity(total);
    circuit.push_back(Step {
        from: to,
        to: from,
        auxiliary: true,
    });

    while circuit.len() < total {
        let tail = match circuit.back() {
            Some(step) => step.to,
            None => break,
        };
        match work.neighbors(tail).first().copied() {
            Some(next) => {
                work.remove_edge(tail, next)?;
                circuit.push_back(Step {
                    from: tail,
                    to: next,
                    auxiliary: false,
                });
            }
            None => {
                // The tail is exhausted, so the circuit closes here.
                let head = circuit.pop_front().ok_or_else(|| {
                    GraphError::invariant("working circuit emptied during rotation")
                })?;
                debug_assert_eq!(head.from, tail);
                circuit.push_back(head);
            }
        }
    }

    debug_assert!((0..circuit.len()).all(|i| circuit[i].to == circuit[(i + 1) % circuit.len()].from));

    let cut = circuit
        .iter()
        .position(|step| step.auxiliary)
        .ok_or_else(|| GraphError::invariant("auxiliary edge lost from the circuit"))?;
    circuit.rotate_left(cut);
    Ok(circuit.iter().map(|step| step.to).collect())
}

/// Every vertex needs even degree once the auxiliary edge `(to, from)` is
/// counted.
fn check_parity(g: &Multigraph, from: Vertex, to: Vertex) -> Result<()> {
    let odd: Vec<Vertex> = g
        .vertices()
        .filter(|&v| {
            let extra = usize::from(v == from) + usize::from(v == to);
            (g.degree(v) + extra) % 2 != 0
        })
        .collect();
    if odd.is_empty() {
        Ok(())
    } else {
        Err(GraphError::not_eulerian(format!(
            "vertices {odd:?} have the wrong degree parity for a trail from {from} to {to}"
        )))
    }
}

/// Check that every vertex with edges, and `to`, is reachable from `from`.
fn check_connectivity(g: &Multigraph, from: Vertex, to: Vertex) -> bool {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(from);
    queue.push_back(from);
    while let Some(u) = queue.pop_front() {
        for &nbr in g.neighbors(u) {
            if visited.insert(nbr) {
                queue.push_back(nbr);
            }
        }
    }
    visited.contains(&to) && g.vertices().all(|v| g.degree(v) == 0 || visited.contains(&v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uses_every_edge(g: &Multigraph, trail: &[Vertex]) -> bool {
        let mut rest = g.clone();
        trail.windows(2).all(|w| rest.remove_edge(w[0], w[1]).is_ok()) && rest.is_empty()
    }

    #[test]
    fn test_square_circuit() {
        let g: Multigraph = [(0, 1), (1, 2), (2, 3), (3, 0)].into_iter().collect();
        assert_eq!(euler_trail(&g, 0, 0).unwrap(), vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_path() {
        let g: Multigraph = [(0, 1), (1, 2), (2, 3), (3, 4)].into_iter().collect();
        assert_eq!(euler_trail(&g, 0, 4).unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(euler_trail(&g, 4, 0).unwrap(), vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_needs_rotation() {
        // Two triangles sharing vertex 2; the greedy walk from 0 closes the
        // first triangle before touching the second.
        let g: Multigraph = [(0, 1), (1, 2), (2, 0), (2, 3), (3, 4), (4, 2)]
            .into_iter()
            .collect();
        let trail = euler_trail(&g, 0, 0).unwrap();
        assert_eq!(trail.len(), 7);
        assert_eq!((trail[0], trail[6]), (0, 0));
        assert!(uses_every_edge(&g, &trail));
    }

    #[test]
    fn test_open_trail_with_parallel_edges() {
        let mut g: Multigraph = [(0, 1), (1, 2), (2, 3)].into_iter().collect();
        g.insert_edge(1, 2);
        g.insert_edge(1, 2);
        let trail = euler_trail(&g, 0, 3).unwrap();
        assert_eq!(trail.len(), 6);
        assert_eq!(trail.first(), Some(&0));
        assert_eq!(trail.last(), Some(&3));
        assert!(uses_every_edge(&g, &trail));
    }

    #[test]
    fn test_empty_graph() {
        let mut g = Multigraph::new();
        g.add_vertex(5);
        assert_eq!(euler_trail(&g, 5, 5).unwrap(), vec![5]);
        g.add_vertex(6);
        assert!(matches!(euler_trail(&g, 5, 6), Err(GraphError::NotEulerian(_))));
    }

    #[test]
    fn test_odd_degree_vertices() {
        // K4: every vertex has degree 3.
        let g: Multigraph = [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2), (1, 3)]
            .into_iter()
            .collect();
        assert!(matches!(euler_trail(&g, 0, 0), Err(GraphError::NotEulerian(_))));
        assert!(matches!(euler_trail(&g, 0, 1), Err(GraphError::NotEulerian(_))));
    }

    #[test]
    fn test_disconnected() {
        let g: Multigraph = [(0, 1), (1, 2), (2, 0), (5, 6), (6, 7), (7, 5)]
            .into_iter()
            .collect();
        assert!(matches!(euler_trail(&g, 0, 0), Err(GraphError::NotEulerian(_))));
    }

    #[test]
    fn test_unknown_endpoint() {
        let g: Multigraph = [(0, 1)].into_iter().collect();
        assert_eq!(euler_trail(&g, 0, 9), Err(GraphError::VertexNotFound(9)));
    }
}

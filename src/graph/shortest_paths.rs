//! Single-source breadth-first distances and paths.

use std::collections::{HashMap, VecDeque};

use crate::error::{GraphError, Result};
use crate::graph::{Multigraph, Vertex};

/// BFS tree of a multigraph rooted at `source`.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    source: Vertex,
    distance: HashMap<Vertex, usize>,
    parent: HashMap<Vertex, Vertex>,
}

impl ShortestPaths {
    /// Runs BFS from `source`.
    ///
    /// # Errors
    /// - `VertexNotFound` if `source` is not a vertex of `g`
    pub fn new(g: &Multigraph, source: Vertex) -> Result<Self> {
        if !g.contains_vertex(source) {
            return Err(GraphError::VertexNotFound(source));
        }

        let mut distance = HashMap::new();
        let mut parent = HashMap::new();
        let mut queue = VecDeque::new();
        distance.insert(source, 0);
        queue.push_back(source);

        while let Some(v) = queue.pop_front() {
            let d = distance[&v];
            for &w in g.neighbors(v) {
                if !distance.contains_key(&w) {
                    distance.insert(w, d + 1);
                    parent.insert(w, v);
                    queue.push_back(w);
                }
            }
        }

        Ok(Self {
            source,
            distance,
            parent,
        })
    }

    #[must_use]
    pub fn source(&self) -> Vertex {
        self.source
    }

    /// Number of edges on a shortest path to `v`, or `None` if unreached.
    #[must_use]
    pub fn distance(&self, v: Vertex) -> Option<usize> {
        self.distance.get(&v).copied()
    }

    #[must_use]
    pub fn is_reached(&self, v: Vertex) -> bool {
        self.distance.contains_key(&v)
    }

    /// Vertex sequence from the source to `v`, or empty if `v` is unreached.
    #[must_use]
    pub fn path(&self, v: Vertex) -> Vec<Vertex> {
        if !self.is_reached(v) {
            return Vec::new();
        }
        let mut path = vec![v];
        let mut cur = v;
        while let Some(&p) = self.parent.get(&cur) {
            path.push(p);
            cur = p;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> Multigraph {
        // 0 - 1 - 2
        // |       |
        // 3 - 4 - 5    6 - 7
        [(0, 1), (1, 2), (0, 3), (3, 4), (4, 5), (2, 5), (6, 7)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_distances() {
        let sp = ShortestPaths::new(&ladder(), 0).unwrap();
        assert_eq!(sp.distance(0), Some(0));
        assert_eq!(sp.distance(2), Some(2));
        assert_eq!(sp.distance(5), Some(3));
        assert_eq!(sp.distance(7), None);
    }

    #[test]
    fn test_paths() {
        let g = ladder();
        let sp = ShortestPaths::new(&g, 1).unwrap();
        assert_eq!(sp.path(1), vec![1]);
        assert_eq!(sp.path(3), vec![1, 0, 3]);
        let p = sp.path(5);
        assert_eq!(p.len(), 3);
        assert!(p.windows(2).all(|w| g.has_edge(w[0], w[1])));
        assert!(sp.path(6).is_empty());
    }

    #[test]
    fn test_unknown_source() {
        assert_eq!(
            ShortestPaths::new(&ladder(), 99).unwrap_err(),
            GraphError::VertexNotFound(99)
        );
    }
}

//! Memoized block trails keyed by endpoints and block content.
//!
//! The content hash is structural and non-cryptographic, so two different
//! blocks can share a key. Every hit is re-validated against the block it is
//! requested for; a trail that does not fit is counted as a collision,
//! dropped, and reported as a miss.

use std::collections::HashMap;

use log::warn;

use crate::graph::{Multigraph, Vertex};
use crate::trail::{is_path_in_graph, Trail};

const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME: u64 = 0x0000_0100_0000_01b3;

type Key = (Vertex, Vertex, u64);

/// Order-independent hash of a block's edge multiset.
#[must_use]
pub fn content_hash(block: &Multigraph) -> u64 {
    let mut edges = block.edges();
    edges.sort_unstable();
    edges.iter().fold(OFFSET_BASIS, |h, &(u, v)| {
        let h = (h ^ u64::from(u as u32)).wrapping_mul(PRIME).rotate_left(17);
        (h ^ u64::from(v as u32)).wrapping_mul(PRIME).rotate_left(17)
    })
}

/// Process-lifetime cache of block trails. Unbounded.
#[derive(Debug, Clone, Default)]
pub struct LongestTrailCache {
    entries: HashMap<Key, Trail>,
    hits: usize,
    misses: usize,
    collisions: usize,
}

impl LongestTrailCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the trail stored for `block` between `from` and `to`. The
    /// stored trail is only returned if it is still a trail of `block` with
    /// the right endpoints.
    pub fn get(&mut self, block: &Multigraph, from: Vertex, to: Vertex) -> Option<Trail> {
        self.get_hashed(block, content_hash(block), from, to)
    }

    /// [`get`](Self::get) with the block's [`content_hash`] already known.
    pub fn get_hashed(
        &mut self,
        block: &Multigraph,
        hash: u64,
        from: Vertex,
        to: Vertex,
    ) -> Option<Trail> {
        let key = (from, to, hash);
        let Some(trail) = self.entries.get(&key) else {
            self.misses += 1;
            return None;
        };
        if is_path_in_graph(block, from, to, trail.vertices()) {
            self.hits += 1;
            return Some(trail.clone());
        }

        warn!(
            "cache collision for block with {} edges between {from} and {to}; recomputing",
            block.num_edges()
        );
        self.entries.remove(&key);
        self.collisions += 1;
        self.misses += 1;
        None
    }

    pub fn insert(&mut self, block: &Multigraph, from: Vertex, to: Vertex, trail: Trail) {
        self.insert_hashed(content_hash(block), from, to, trail);
    }

    pub fn insert_hashed(&mut self, hash: u64, from: Vertex, to: Vertex, trail: Trail) {
        self.entries.insert((from, to, hash), trail);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits
    }

    #[must_use]
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Hits rejected because the stored trail did not fit the block.
    #[must_use]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

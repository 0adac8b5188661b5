//! # Longest-Trail Engine
//!
//! Ties the pieces together. A graph is split into its bridge forest; inside
//! each 2-edge-connected block the trail is an Euler trail of the block after
//! odd-vertex reduction, and blocks are chained through the bridges joining
//! them, each bridge crossed once.
//!
//! Within a block:
//! 1. Look the block up in the cache.
//! 2. With no odd vertices, the Euler trail of the whole block is the answer.
//! 3. Otherwise reduce the block and solve the reduced graph recursively; the
//!    reduced graph may have bridges of its own.
//! 4. If no reduction keeps the endpoints connected, answer with a shortest
//!    path and mark the trail degraded.
//! 5. Improve the result with the [`Expander`] against the full block, under
//!    a sub-deadline.
//!
//! The deadline is polled on entry to every block and throughout the
//! reduction. Once it has fired, remaining blocks are answered from the cache
//! or with shortest paths so the caller still gets a valid trail.

use std::time::Instant;

use log::{debug, warn};

use crate::error::{GraphError, Result};
use crate::graph::{euler_trail, BridgeForest, Multigraph, ShortestPaths, Vertex};
use crate::timing::{Deadline, Timers};
use crate::trail::{
    content_hash, is_path_in_graph, trail_score, EdgeScore, Expander, LongestTrailCache,
    OddVertexReducer, Trail, TrailConfig, UnitScore,
};

/// Owns everything one run needs: configuration, deadline stack, cache,
/// timers and the edge scorer.
#[derive(Debug)]
pub struct TrailEngine<S: EdgeScore = UnitScore> {
    config: TrailConfig,
    deadline: Deadline,
    cache: LongestTrailCache,
    timers: Timers,
    score: S,
}

impl TrailEngine<UnitScore> {
    /// An engine counting every edge as one.
    #[must_use]
    pub fn new(config: TrailConfig) -> Self {
        Self::with_score(config, UnitScore)
    }
}

impl<S: EdgeScore> TrailEngine<S> {
    #[must_use]
    pub fn with_score(config: TrailConfig, score: S) -> Self {
        Self {
            config,
            deadline: Deadline::unlimited(),
            cache: LongestTrailCache::new(),
            timers: Timers::new(),
            score,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TrailConfig {
        &self.config
    }

    /// Pushes a deadline `seconds` from now.
    pub fn set_deadline(&mut self, seconds: f64) {
        self.deadline.set_from_now(seconds);
    }

    pub fn push_subdeadline(&mut self, fraction: f64) {
        self.deadline.push_subdeadline(fraction);
    }

    pub fn pop_subdeadline(&mut self) {
        self.deadline.pop_subdeadline();
    }

    #[must_use]
    pub fn deadline_expired(&self) -> bool {
        self.deadline.expired()
    }

    #[must_use]
    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    #[must_use]
    pub fn cache(&self) -> &LongestTrailCache {
        &self.cache
    }

    #[must_use]
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Best-effort longest trail from `from` to `to`. Empty if `to` is not
    /// reachable from `from`.
    ///
    /// # Errors
    /// - `VertexNotFound` if `from` or `to` is not in `g`
    pub fn build_trail(&mut self, g: &Multigraph, from: Vertex, to: Vertex) -> Result<Trail> {
        for v in [from, to] {
            if !g.contains_vertex(v) {
                return Err(GraphError::VertexNotFound(v));
            }
        }
        let trail = self.trail_in_graph(g, from, to, 0)?;
        debug_assert!(trail.is_empty() || is_path_in_graph(g, from, to, trail.vertices()));
        self.timers.report();
        Ok(trail)
    }

    /// Best-effort longest trail starting at `start` and ending anywhere in
    /// its component.
    ///
    /// Blocks are solved bottom-up. The best trail entering a block is the
    /// highest-scoring of: stopping at the entry, a closed circuit inside the
    /// block (when enabled), or walking to a child's bridge and continuing
    /// with the child's best trail.
    ///
    /// # Errors
    /// - `VertexNotFound` if `start` is not in `g`
    pub fn build_trail_from(&mut self, g: &Multigraph, start: Vertex) -> Result<Trail> {
        if !g.contains_vertex(start) {
            return Err(GraphError::VertexNotFound(start));
        }
        let forest = BridgeForest::from_start(g, start);
        let mut best: Vec<Trail> = vec![Trail::empty(); forest.len()];

        for index in (0..forest.len()).rev() {
            let block = forest.block(index)?;
            let entry = block.entry;
            let hash = content_hash(&block.graph);
            let mut paths = None;

            let mut candidates = vec![Trail::new(vec![entry])];
            if self.config.close_blocks && !block.graph.is_empty() {
                candidates.push(self.longest_in_block(&block.graph, hash, entry, entry, 0)?);
            }
            for &child in &block.children {
                let (exit, child_entry) = bridge_of(&forest, child)?;
                let mut trail = if self.deadline.expired() {
                    self.fallback_trail(&block.graph, hash, entry, exit, &mut paths)?
                } else {
                    self.longest_in_block(&block.graph, hash, entry, exit, 0)?
                };
                trail.extend(&Trail::new(vec![exit, child_entry]));
                trail.extend(&best[child]);
                candidates.push(trail);
            }

            let mut chosen = Trail::empty();
            let mut chosen_score = i64::MIN;
            for candidate in candidates {
                let score = trail_score(&self.score, candidate.vertices());
                if score > chosen_score {
                    chosen_score = score;
                    chosen = candidate;
                }
            }
            best[index] = chosen;
        }

        let root = forest
            .roots()
            .first()
            .copied()
            .ok_or_else(|| GraphError::invariant("bridge forest has no root"))?;
        let trail = std::mem::take(&mut best[root]);
        self.timers.report();
        Ok(trail)
    }

    fn trail_in_graph(
        &mut self,
        g: &Multigraph,
        from: Vertex,
        to: Vertex,
        depth: usize,
    ) -> Result<Trail> {
        let forest = BridgeForest::from_start(g, from);
        let Some(mut index) = forest.block_of(to) else {
            return Ok(Trail::empty());
        };
        let start_block = forest
            .block_of(from)
            .ok_or_else(|| GraphError::invariant(format!("start {from} has no block")))?;

        // Walk up from the block of `to`; fragments come out in reverse.
        let mut fragments = Vec::new();
        let mut v = to;
        while index != start_block {
            let (exit, entry) = bridge_of(&forest, index)?;
            let block = &forest.block(index)?.graph;
            fragments.push(self.longest_in_block(block, content_hash(block), entry, v, depth)?);
            fragments.push(Trail::new(vec![exit, entry]));
            v = exit;
            index = forest
                .block_of(exit)
                .ok_or_else(|| GraphError::invariant(format!("bridge end {exit} has no block")))?;
        }
        let block = &forest.block(start_block)?.graph;
        fragments.push(self.longest_in_block(block, content_hash(block), from, v, depth)?);

        let mut trail = Trail::new(vec![from]);
        for fragment in fragments.iter().rev() {
            trail.extend(fragment);
        }
        Ok(trail)
    }

    /// Best trail from `from` to `to` inside one block; `hash` is the block's
    /// [`content_hash`].
    fn longest_in_block(
        &mut self,
        block: &Multigraph,
        hash: u64,
        from: Vertex,
        to: Vertex,
        depth: usize,
    ) -> Result<Trail> {
        if block.is_empty() {
            return if from == to {
                Ok(Trail::new(vec![from]))
            } else {
                Err(GraphError::invariant(format!(
                    "edgeless block cannot join {from} and {to}"
                )))
            };
        }
        if self.config.use_cache {
            if let Some(trail) = self.cache.get_hashed(block, hash, from, to) {
                return Ok(trail);
            }
        }
        if self.deadline.expired() {
            return shortest_path(block, from, to).map(Trail::new);
        }

        let started = Instant::now();
        let base = self.base_trail(block, from, to, depth)?;
        self.timers.record("block_trail", started.elapsed());

        let expand = depth == 0 && self.config.expand;
        let trail = if expand && !self.deadline.expired() {
            self.expand(block, base)?
        } else {
            base
        };
        // Inner unexpanded trails and deadline fallbacks are not cached.
        let finished = expand || !self.config.expand;
        if self.config.use_cache && finished && !self.deadline.expired() {
            self.cache.insert_hashed(hash, from, to, trail.clone());
        }
        Ok(trail)
    }

    /// Answer for a block once the deadline has fired: the cached trail if
    /// there is one, else a shortest path. `paths` keeps the search from
    /// `from` so that sibling exits share it.
    fn fallback_trail(
        &mut self,
        block: &Multigraph,
        hash: u64,
        from: Vertex,
        to: Vertex,
        paths: &mut Option<ShortestPaths>,
    ) -> Result<Trail> {
        if block.is_empty() {
            return self.longest_in_block(block, hash, from, to, 0);
        }
        if self.config.use_cache {
            if let Some(trail) = self.cache.get_hashed(block, hash, from, to) {
                return Ok(trail);
            }
        }
        let sp = match paths.take() {
            Some(sp) if sp.source() == from => sp,
            _ => ShortestPaths::new(block, from)?,
        };
        let path = path_within(&sp, to);
        *paths = Some(sp);
        path.map(Trail::new)
    }

    /// Euler trail of the block, or of its reduction, before expansion.
    fn base_trail(
        &mut self,
        block: &Multigraph,
        from: Vertex,
        to: Vertex,
        depth: usize,
    ) -> Result<Trail> {
        let reducer = OddVertexReducer::new(block, from, to)?;
        if reducer.odd_vertices().is_empty() {
            return euler_trail(block, from, to).map(Trail::new);
        }

        let reduction = reducer.reduce(&self.deadline)?;
        if self.deadline.expired() {
            debug!(
                "deadline expired reducing a block of {} edges; using a shortest path",
                block.num_edges()
            );
            return shortest_path(block, from, to).map(Trail::new);
        }
        if let Some(reduction) = reduction {
            debug!(
                "block of {} edges from {from} to {to}: removed {} edges ({:?})",
                block.num_edges(),
                reduction.removed.len(),
                reduction.strategy
            );
            let trail = self.trail_in_graph(&reduction.graph, from, to, depth + 1)?;
            if !trail.is_empty() {
                return Ok(trail);
            }
        }

        warn!(
            "no Euler-based trail from {from} to {to} in a block of {} edges; using a shortest path",
            block.num_edges()
        );
        shortest_path(block, from, to).map(Trail::degraded)
    }

    fn expand(&mut self, block: &Multigraph, base: Trail) -> Result<Trail> {
        let started = Instant::now();
        self.deadline.push_subdeadline(self.config.expansion_fraction);
        let expanded = Expander::new(block, base.vertices().to_vec(), &self.score).and_then(
            |mut expander| {
                expander.optimize(&self.deadline, self.config.seed, self.config.max_passes)?;
                Ok(expander.into_trail())
            },
        );
        self.deadline.pop_subdeadline();
        self.timers.record("expansion", started.elapsed());

        Ok(Trail {
            vertices: expanded?,
            degraded: base.degraded,
        })
    }
}

fn bridge_of(forest: &BridgeForest, index: usize) -> Result<(Vertex, Vertex)> {
    forest
        .block(index)?
        .bridge
        .ok_or_else(|| GraphError::invariant(format!("block {index} has no bridge to its parent")))
}

fn shortest_path(block: &Multigraph, from: Vertex, to: Vertex) -> Result<Vec<Vertex>> {
    path_within(&ShortestPaths::new(block, from)?, to)
}

fn path_within(sp: &ShortestPaths, to: Vertex) -> Result<Vec<Vertex>> {
    let path = sp.path(to);
    if path.is_empty() {
        return Err(GraphError::invariant(format!(
            "{to} is not reachable from {} inside its block",
            sp.source()
        )));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::trail::CellValueScore;

    fn square_with_chord() -> Multigraph {
        [(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)].into_iter().collect()
    }

    fn engine() -> TrailEngine {
        TrailEngine::new(TrailConfig::default())
    }

    #[test]
    fn test_chord_trail_beats_shortest_path() {
        let g = square_with_chord();
        let trail = engine().build_trail(&g, 0, 1).unwrap();
        assert!(is_path_in_graph(&g, 0, 1, trail.vertices()));
        assert!(trail.num_edges() > 1);
        assert!(trail.num_edges() <= g.num_edges());
        assert_eq!(trail.num_edges(), 4);
        assert!(!trail.is_degraded());
    }

    #[test]
    fn test_path_graph() {
        let g: Multigraph = [(0, 1), (1, 2), (2, 3), (3, 4)].into_iter().collect();
        let trail = engine().build_trail(&g, 0, 4).unwrap();
        assert_eq!(trail.vertices(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_crosses_bridges_between_blocks() {
        // Two squares joined by the bridge 3-4.
        let g: Multigraph = [
            (0, 1),
            (1, 2),
            (2, 3),
            (3, 0),
            (3, 4),
            (4, 5),
            (5, 6),
            (6, 7),
            (7, 4),
        ]
        .into_iter()
        .collect();
        let trail = engine().build_trail(&g, 0, 4).unwrap();
        assert!(is_path_in_graph(&g, 0, 4, trail.vertices()));
        // Three edges to the bridge, then the whole second square.
        assert_eq!(trail.num_edges(), 8);

        let trail = engine().build_trail(&g, 1, 6).unwrap();
        assert!(is_path_in_graph(&g, 1, 6, trail.vertices()));
        assert_eq!(trail.num_edges(), 5);
    }

    #[test]
    fn test_unreachable_target() {
        let g: Multigraph = [(0, 1), (5, 6)].into_iter().collect();
        assert!(engine().build_trail(&g, 0, 6).unwrap().is_empty());
        assert_eq!(
            engine().build_trail(&g, 0, 9),
            Err(GraphError::VertexNotFound(9))
        );
    }

    #[test]
    fn test_trail_from_start_picks_longest_branch() {
        // Triangle 0-1-2 with the tail 2-3-4.
        let g: Multigraph = [(0, 1), (1, 2), (2, 0), (2, 3), (3, 4)].into_iter().collect();
        let trail = engine().build_trail_from(&g, 0).unwrap();
        assert_eq!(trail.num_edges(), 4);
        assert_eq!(trail.first(), Some(0));
        assert_eq!(trail.last(), Some(4));
        assert!(is_path_in_graph(&g, 0, 4, trail.vertices()));
    }

    #[test]
    fn test_trail_from_start_closes_block() {
        // Square with a one-edge tail: the circuit is worth more.
        let g: Multigraph = [(0, 1), (1, 2), (2, 3), (3, 0), (0, 4)].into_iter().collect();
        let trail = engine().build_trail_from(&g, 0).unwrap();
        assert_eq!(trail.num_edges(), 5);
        assert_eq!(trail.last(), Some(4));

        let lonely = Multigraph::from_edges([(0, 1), (1, 2), (2, 0)]);
        let circuit = engine().build_trail_from(&lonely, 1).unwrap();
        assert_eq!((circuit.first(), circuit.last()), (Some(1), Some(1)));
        assert_eq!(circuit.num_edges(), 3);

        let open = TrailEngine::new(TrailConfig::default().with_closed_blocks(false))
            .build_trail_from(&lonely, 1)
            .unwrap();
        assert_eq!(open.vertices(), &[1]);
    }

    #[test]
    fn test_degraded_block_falls_back_to_shortest_path() {
        // No reduction of this graph keeps 0 and 3 connected.
        let g: Multigraph = [(0, 1), (1, 2), (2, 3), (1, 4), (2, 5)].into_iter().collect();
        let hash = content_hash(&g);
        let mut engine = engine();
        let trail = engine.longest_in_block(&g, hash, 0, 3, 0).unwrap();
        assert_eq!(trail.vertices(), &[0, 1, 2, 3]);
        assert!(trail.is_degraded());

        let again = engine.longest_in_block(&g, hash, 0, 3, 0).unwrap();
        assert_eq!(again, trail);
        assert_eq!(engine.cache().hits(), 1);
    }

    #[test]
    fn test_cache_reuses_block_trails() {
        let g = square_with_chord();
        let mut engine = engine();
        let first = engine.build_trail(&g, 0, 1).unwrap();
        let misses = engine.cache().misses();
        let second = engine.build_trail(&g, 0, 1).unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.cache().misses(), misses);
        assert!(engine.cache().hits() > 0);

        let mut uncached = TrailEngine::new(TrailConfig::default().with_cache(false));
        uncached.build_trail(&g, 0, 1).unwrap();
        assert!(uncached.cache().is_empty());
    }

    #[test]
    fn test_expired_deadline_returns_shortest_path() {
        let g = square_with_chord();
        let mut engine = engine();
        engine.set_deadline(0.0);
        std::thread::sleep(Duration::from_millis(2));
        assert!(engine.deadline_expired());

        let trail = engine.build_trail(&g, 0, 1).unwrap();
        assert_eq!(trail.vertices(), &[0, 1]);
        assert!(!trail.is_degraded());
    }

    #[test]
    fn test_expired_deadline_keeps_cached_trails() {
        let g = square_with_chord();
        let mut engine = engine();
        let full = engine.build_trail(&g, 0, 1).unwrap();
        assert_eq!(full.num_edges(), 4);

        engine.set_deadline(0.0);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(engine.build_trail(&g, 0, 1).unwrap(), full);
    }

    #[test]
    fn test_expired_deadline_still_crosses_bridges() {
        // Triangle 0-1-2 with the tail 2-3-4.
        let g: Multigraph = [(0, 1), (1, 2), (2, 0), (2, 3), (3, 4)].into_iter().collect();
        let mut engine = engine();
        engine.set_deadline(0.0);
        std::thread::sleep(Duration::from_millis(2));

        let trail = engine.build_trail_from(&g, 0).unwrap();
        assert_eq!(trail.vertices(), &[0, 2, 3, 4]);
        assert!(!trail.is_degraded());
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn test_inner_trails_are_not_cached() {
        let g = square_with_chord();
        let hash = content_hash(&g);
        let mut engine = engine();
        let inner = engine.longest_in_block(&g, hash, 0, 1, 1).unwrap();
        assert!(is_path_in_graph(&g, 0, 1, inner.vertices()));
        assert!(engine.cache().is_empty());

        engine.longest_in_block(&g, hash, 0, 1, 0).unwrap();
        assert_eq!(engine.cache().len(), 1);

        // Without expansion every trail is final: the block and the
        // triangle left after removing 1-2 are both stored.
        let mut plain = TrailEngine::new(TrailConfig::default().with_expansion(false));
        plain.longest_in_block(&g, hash, 0, 1, 1).unwrap();
        assert_eq!(plain.cache().len(), 2);
    }

    #[test]
    fn test_subdeadlines_nest() {
        let mut engine = engine();
        engine.set_deadline(60.0);
        engine.push_subdeadline(0.0);
        std::thread::sleep(Duration::from_millis(2));
        assert!(engine.deadline_expired());
        engine.pop_subdeadline();
        assert!(!engine.deadline_expired());
        assert_eq!(engine.deadline().depth(), 1);
    }

    #[test]
    fn test_without_expansion() {
        let g = square_with_chord();
        let mut engine = TrailEngine::new(TrailConfig::default().with_expansion(false));
        let trail = engine.build_trail(&g, 0, 1).unwrap();
        assert!(is_path_in_graph(&g, 0, 1, trail.vertices()));
        assert_eq!(engine.timers().total("expansion"), Duration::ZERO);
    }

    #[test]
    fn test_cell_values_steer_the_trail() {
        // From 0: a single valuable jump to 10, or three worthless jumps
        // to 40.
        let g: Multigraph = [(0, 10), (0, 20), (20, 30), (30, 40)].into_iter().collect();
        let unit = engine().build_trail_from(&g, 0).unwrap();
        assert_eq!(unit.last(), Some(40));

        let mut cells = vec![0; 36];
        cells[5] = 50;
        let mut valued =
            TrailEngine::with_score(TrailConfig::default(), CellValueScore::new(cells));
        let trail = valued.build_trail_from(&g, 0).unwrap();
        assert_eq!(trail.vertices(), &[0, 10]);
    }
}

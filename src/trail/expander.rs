//! # Expander
//!
//! Local search that lengthens a trail by rerouting it through the edges it
//! does not use (the *leftover* graph).
//!
//! ## Rerouting
//! [`Expander::expand`] grows a BFS tree over the leftover graph from a root
//! vertex. Every tree node that lies on the trail contributes a frontier
//! entry `(P, E, position)`: cutting the trail at `position`, whose prefix
//! score is `P`, and walking up the tree gains `E` by the time the node is
//! reached. At each tree node two entries from different child branches are
//! joined into a detour that replaces the trail segment between their
//! positions:
//!
//! ```text
//! gain = E1 + E2 - |P1 - P2|
//! ```
//!
//! With `P1 <= P2` this splits into `(E1 + P1) + (E2 - P2)`, so one sweep in
//! order of `P` finds the best pair at a node. Frontiers are pruned to their
//! Pareto front on `(E + P, E - P)` before being passed up; a dominated
//! entry can never beat the entry dominating it.
//!
//! ## Cycles
//! [`Expander::expand_cycle`] inserts a leftover cycle through a trail vertex
//! without removing anything.
//!
//! Every mutation is a single splice that moves edges between the trail and
//! the leftover graph, so the trail stays valid between any two calls.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::error::{GraphError, Result};
use crate::graph::{Multigraph, ShortestPaths, Vertex};
use crate::timing::Deadline;
use crate::trail::{is_path_in_graph, EdgeScore};

/// Summary of an [`Expander::optimize`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpansionStats {
    pub passes: usize,
    pub expansions: usize,
    pub cycle_insertions: usize,
    /// Score added to the trail.
    pub gained: i64,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    prefix: i64,
    extra: i64,
    position: usize,
}

impl Entry {
    fn ascending(&self) -> i64 {
        self.extra + self.prefix
    }

    fn descending(&self) -> i64 {
        self.extra - self.prefix
    }
}

/// Best detour found so far: the trail segment `lo..=hi` is replaced by the
/// tree path from `trail[lo]` through `meet` to `trail[hi]`.
#[derive(Debug, Clone, Copy)]
struct Detour {
    gain: i64,
    meet: Vertex,
    lo: usize,
    hi: usize,
}

/// Drops every entry dominated on both `extra + prefix` and `extra - prefix`.
fn prune(mut frontier: Vec<Entry>) -> Vec<Entry> {
    frontier.sort_by(|x, y| {
        y.ascending()
            .cmp(&x.ascending())
            .then(y.descending().cmp(&x.descending()))
    });
    let mut kept: Vec<Entry> = Vec::with_capacity(frontier.len());
    for entry in frontier {
        if kept.last().map_or(true, |k| entry.descending() > k.descending()) {
            kept.push(entry);
        }
    }
    kept
}

/// Best pair of entries from different groups, joined at `meet`.
fn best_pair(groups: &[Vec<Entry>], meet: Vertex) -> Option<Detour> {
    let mut tagged: Vec<(Entry, usize)> = groups
        .iter()
        .enumerate()
        .flat_map(|(g, entries)| entries.iter().map(move |&e| (e, g)))
        .collect();
    tagged.sort_by_key(|(e, _)| (e.prefix, e.position));

    let mut best: Option<Detour> = None;
    let mut first: Option<(Entry, usize)> = None;
    let mut second: Option<(Entry, usize)> = None;
    for (y, group) in tagged {
        let partner = match first {
            Some((x, g)) if g != group => Some(x),
            _ => second.map(|(x, _)| x),
        };
        if let Some(x) = partner {
            let gain = x.ascending() + y.descending();
            if best.map_or(true, |b| gain > b.gain) {
                best = Some(Detour {
                    gain,
                    meet,
                    lo: x.position.min(y.position),
                    hi: x.position.max(y.position),
                });
            }
        }

        match first {
            Some((x, g)) if y.ascending() <= x.ascending() => {
                if g != group && second.map_or(true, |(s, _)| y.ascending() > s.ascending()) {
                    second = Some((y, group));
                }
            }
            Some((x, g)) => {
                if g != group {
                    second = Some((x, g));
                }
                first = Some((y, group));
            }
            None => first = Some((y, group)),
        }
    }
    best
}

/// A trail under improvement together with its leftover graph.
pub struct Expander<'a, S: EdgeScore + ?Sized> {
    graph: &'a Multigraph,
    score: &'a S,
    trail: Vec<Vertex>,
    leftover: Multigraph,
    prefix: Vec<i64>,
    positions: HashMap<Vertex, Vec<usize>>,
}

impl<'a, S: EdgeScore + ?Sized> Expander<'a, S> {
    /// # Errors
    /// - `InvalidInput` if `trail` is empty or not a trail of `graph`
    pub fn new(graph: &'a Multigraph, trail: Vec<Vertex>, score: &'a S) -> Result<Self> {
        let (Some(&from), Some(&to)) = (trail.first(), trail.last()) else {
            return Err(GraphError::invalid_input("cannot expand an empty trail"));
        };
        if !is_path_in_graph(graph, from, to, &trail) {
            return Err(GraphError::invalid_input(format!(
                "{trail:?} is not a trail of the graph"
            )));
        }
        let mut leftover = graph.clone();
        for w in trail.windows(2) {
            leftover.remove_edge(w[0], w[1])?;
        }
        let mut expander = Self {
            graph,
            score,
            trail,
            leftover,
            prefix: Vec::new(),
            positions: HashMap::new(),
        };
        expander.refresh();
        Ok(expander)
    }

    /// Recomputes the per-position prefix scores and the vertex positions.
    pub fn refresh(&mut self) {
        self.prefix.clear();
        self.prefix.reserve(self.trail.len());
        self.positions.clear();
        let mut total = 0;
        for (i, &v) in self.trail.iter().enumerate() {
            if i > 0 {
                total += self.score.score(self.trail[i - 1], v);
            }
            self.prefix.push(total);
            self.positions.entry(v).or_default().push(i);
        }
    }

    #[must_use]
    pub fn trail(&self) -> &[Vertex] {
        &self.trail
    }

    #[must_use]
    pub fn into_trail(self) -> Vec<Vertex> {
        self.trail
    }

    /// Edges not used by the trail.
    #[must_use]
    pub fn leftover(&self) -> &Multigraph {
        &self.leftover
    }

    /// Score of the current trail.
    #[must_use]
    pub fn score(&self) -> i64 {
        self.prefix.last().copied().unwrap_or_default()
    }

    /// Tries the best reroute through the leftover BFS tree rooted at `root`.
    /// Returns `true` if the trail improved.
    ///
    /// # Errors
    /// - `VertexNotFound` if `root` is not in the graph
    pub fn expand(&mut self, root: Vertex) -> Result<bool> {
        if !self.leftover.contains_vertex(root) {
            return Err(GraphError::VertexNotFound(root));
        }

        let mut order = vec![root];
        let mut parent: HashMap<Vertex, Vertex> = HashMap::new();
        let mut seen = HashSet::from([root]);
        let mut head = 0;
        while let Some(&u) = order.get(head) {
            head += 1;
            for &w in self.leftover.neighbors(u) {
                if seen.insert(w) {
                    parent.insert(w, u);
                    order.push(w);
                }
            }
        }

        let mut pending: HashMap<Vertex, Vec<Vec<Entry>>> = HashMap::new();
        let mut best: Option<Detour> = None;
        for &m in order.iter().rev() {
            let mut groups = pending.remove(&m).unwrap_or_default();
            if let Some(own) = self.positions.get(&m) {
                groups.push(
                    own.iter()
                        .map(|&position| Entry {
                            prefix: self.prefix[position],
                            extra: 0,
                            position,
                        })
                        .collect(),
                );
            }
            if groups.len() > 1 {
                if let Some(found) = best_pair(&groups, m) {
                    if best.map_or(true, |b| found.gain > b.gain) {
                        best = Some(found);
                    }
                }
            }

            let Some(&p) = parent.get(&m) else {
                continue;
            };
            let step = self.score.score(p, m);
            let frontier = prune(groups.into_iter().flatten().collect());
            if !frontier.is_empty() {
                let shifted = frontier
                    .into_iter()
                    .map(|e| Entry {
                        extra: e.extra + step,
                        ..e
                    })
                    .collect();
                pending.entry(p).or_default().push(shifted);
            }
        }

        let Some(detour) = best.filter(|d| d.gain > 0) else {
            return Ok(false);
        };
        let climb = |mut v: Vertex| {
            let mut path = vec![v];
            while v != detour.meet {
                match parent.get(&v) {
                    Some(&p) => v = p,
                    None => break,
                }
                path.push(v);
            }
            path
        };
        let mut path = climb(self.trail[detour.lo]);
        let mut down = climb(self.trail[detour.hi]);
        down.pop();
        path.extend(down.into_iter().rev());

        trace!(
            "rerouting positions {}..={} through {} (gain {})",
            detour.lo,
            detour.hi,
            detour.meet,
            detour.gain
        );
        self.splice(detour.lo, detour.hi, path)?;
        Ok(true)
    }

    /// Inserts a leftover cycle through the trail vertex at `position`.
    /// Returns `true` if one was found.
    ///
    /// # Errors
    /// - `InvalidInput` if `position` is past the end of the trail
    pub fn expand_cycle(&mut self, position: usize) -> Result<bool> {
        let Some(&v) = self.trail.get(position) else {
            return Err(GraphError::invalid_input(format!(
                "position {position} is past the end of a trail of {} vertices",
                self.trail.len()
            )));
        };

        let mut candidates = self.leftover.neighbors(v).to_vec();
        candidates.sort_unstable();
        candidates.dedup();
        for w in candidates {
            self.leftover.remove_edge(v, w)?;
            let back = ShortestPaths::new(&self.leftover, w)?.path(v);
            self.leftover.insert_edge(v, w);
            if back.is_empty() {
                continue;
            }

            let mut cycle = Vec::with_capacity(back.len() + 1);
            cycle.push(v);
            cycle.extend(back);
            trace!("inserting a cycle of {} edges at {v}", cycle.len() - 1);
            self.splice(position, position, cycle)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Replaces `trail[lo..=hi]` with `path`, which must run from `trail[lo]`
    /// to `trail[hi]` over leftover edges.
    fn splice(&mut self, lo: usize, hi: usize, path: Vec<Vertex>) -> Result<()> {
        debug_assert_eq!(path.first(), self.trail.get(lo));
        debug_assert_eq!(path.last(), self.trail.get(hi));
        for w in path.windows(2) {
            self.leftover.remove_edge(w[0], w[1])?;
        }
        for w in self.trail[lo..=hi].windows(2) {
            self.leftover.insert_edge(w[0], w[1]);
        }
        self.trail.splice(lo..=hi, path);
        self.refresh();

        debug_assert!(self.is_valid());
        Ok(())
    }

    fn is_valid(&self) -> bool {
        let (Some(&from), Some(&to)) = (self.trail.first(), self.trail.last()) else {
            return false;
        };
        is_path_in_graph(self.graph, from, to, &self.trail)
            && self.leftover.num_edges() + self.trail.len() - 1 == self.graph.num_edges()
    }

    /// Applies cycle insertions and reroutes from shuffled roots until a full
    /// pass changes nothing, `max_passes` is reached, or `deadline` expires.
    /// Each pass reshuffles with `seed ^ pass`.
    ///
    /// # Errors
    /// Propagates graph errors, which indicate a broken invariant.
    pub fn optimize(
        &mut self,
        deadline: &Deadline,
        seed: u64,
        max_passes: Option<usize>,
    ) -> Result<ExpansionStats> {
        let mut stats = ExpansionStats::default();
        let start_score = self.score();

        'passes: loop {
            if max_passes.is_some_and(|limit| stats.passes >= limit) {
                break;
            }
            if deadline.expired() {
                stats.timed_out = true;
                break;
            }

            let mut rng = ChaCha20Rng::seed_from_u64(seed ^ stats.passes as u64);
            let mut roots: Vec<Vertex> = self
                .leftover
                .vertices()
                .filter(|&v| self.leftover.degree(v) > 0)
                .collect();
            roots.shuffle(&mut rng);
            stats.passes += 1;

            let mut improved = false;
            for root in roots {
                if deadline.expired() {
                    stats.timed_out = true;
                    break 'passes;
                }
                while let Some(&position) = self.positions.get(&root).and_then(|p| p.first()) {
                    if !self.expand_cycle(position)? {
                        break;
                    }
                    stats.cycle_insertions += 1;
                    improved = true;
                    if deadline.expired() {
                        stats.timed_out = true;
                        break 'passes;
                    }
                }
                while self.expand(root)? {
                    stats.expansions += 1;
                    improved = true;
                    if deadline.expired() {
                        stats.timed_out = true;
                        break 'passes;
                    }
                }
            }
            if !improved {
                break;
            }
        }

        stats.gained = self.score() - start_score;
        debug!(
            "expansion: {} passes, {} reroutes, {} cycles, gained {}{}",
            stats.passes,
            stats.expansions,
            stats.cycle_insertions,
            stats.gained,
            if stats.timed_out { " (timed out)" } else { "" }
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trail::UnitScore;

    fn graph(edges: &[(Vertex, Vertex)]) -> Multigraph {
        let mut g = Multigraph::new();
        for &(u, v) in edges {
            g.insert_edge(u, v);
        }
        g
    }

    fn assert_valid<S: EdgeScore + ?Sized>(ex: &Expander<'_, S>, from: Vertex, to: Vertex) {
        assert!(is_path_in_graph(ex.graph, from, to, ex.trail()));
        assert_eq!(
            ex.leftover().num_edges() + ex.trail().len() - 1,
            ex.graph.num_edges()
        );
    }

    #[test]
    fn test_prune_keeps_pareto_front() {
        let e = |prefix, extra, position| Entry {
            prefix,
            extra,
            position,
        };
        // (3, 3) dominates (4, 1): 3 - 1 >= |3 - 4|.
        let kept = prune(vec![e(3, 3, 0), e(4, 1, 1), e(10, 2, 2), e(0, 1, 3)]);
        let positions: HashSet<usize> = kept.iter().map(|x| x.position).collect();
        assert_eq!(positions, HashSet::from([0, 2, 3]));
    }

    #[test]
    fn test_best_pair_needs_two_groups() {
        let e = |prefix, extra, position| Entry {
            prefix,
            extra,
            position,
        };
        assert!(best_pair(&[vec![e(0, 5, 0), e(2, 5, 2)]], 9).is_none());

        let found = best_pair(&[vec![e(0, 1, 0)], vec![e(2, 2, 2)]], 9).unwrap();
        assert_eq!((found.gain, found.lo, found.hi, found.meet), (1, 0, 2, 9));
    }

    #[test]
    fn test_reroute_through_longer_detour() {
        // Trail 0-1-2; the leftover path 0-5-6-2 is one edge longer.
        let g = graph(&[(0, 1), (1, 2), (0, 5), (5, 6), (6, 2)]);
        let mut ex = Expander::new(&g, vec![0, 1, 2], &UnitScore).unwrap();
        assert!(ex.expand(5).unwrap());
        assert_eq!(ex.trail(), &[0, 5, 6, 2]);
        assert_valid(&ex, 0, 2);
        assert!(ex.leftover().has_edge(0, 1));

        // Swapping back would lose an edge.
        assert!(!ex.expand(1).unwrap());
        assert!(!ex.expand(5).unwrap());
    }

    #[test]
    fn test_reroute_from_trail_root() {
        let g = graph(&[(0, 1), (1, 2), (0, 5), (5, 6), (6, 2)]);
        let mut ex = Expander::new(&g, vec![0, 1, 2], &UnitScore).unwrap();
        assert!(ex.expand(0).unwrap());
        assert_eq!(ex.trail(), &[0, 5, 6, 2]);
    }

    #[test]
    fn test_dumbbell_cycles() {
        // Trail 0-1-2-3 with leftover triangles hanging off 1 and 2.
        let g = graph(&[
            (0, 1),
            (1, 2),
            (2, 3),
            (1, 10),
            (10, 11),
            (11, 1),
            (2, 20),
            (20, 21),
            (21, 2),
        ]);
        let mut ex = Expander::new(&g, vec![0, 1, 2, 3], &UnitScore).unwrap();
        assert!(ex.expand_cycle(1).unwrap());
        assert_eq!(ex.trail().len(), 7);
        assert_eq!(&ex.trail()[..2], &[0, 1]);
        assert_eq!(ex.trail()[4], 1);
        assert_valid(&ex, 0, 3);

        let position = ex.trail().iter().position(|&v| v == 2).unwrap();
        assert!(ex.expand_cycle(position).unwrap());
        assert_eq!(ex.trail().len(), 10);
        assert!(ex.leftover().is_empty());
        assert_valid(&ex, 0, 3);

        assert!(!ex.expand_cycle(0).unwrap());
    }

    #[test]
    fn test_parallel_edges_form_cycle() {
        let g = graph(&[(0, 1), (1, 2), (1, 2), (1, 2)]);
        let mut ex = Expander::new(&g, vec![0, 1, 2], &UnitScore).unwrap();
        assert!(ex.expand_cycle(2).unwrap());
        assert_eq!(ex.trail(), &[0, 1, 2, 1, 2]);
        assert_valid(&ex, 0, 2);
    }

    #[test]
    fn test_path_has_nothing_to_gain() {
        let g = graph(&[(0, 1), (1, 2), (2, 3), (3, 4)]);
        let mut ex = Expander::new(&g, vec![0, 1, 2, 3, 4], &UnitScore).unwrap();
        let stats = ex.optimize(&Deadline::unlimited(), 0, None).unwrap();
        assert_eq!(ex.trail(), &[0, 1, 2, 3, 4]);
        assert_eq!(stats.gained, 0);
        assert_eq!(stats.passes, 1);
    }

    #[test]
    fn test_optimize_converges_and_is_idempotent() {
        // Two squares sharing vertex 2, plus a tail; start from a short trail.
        let g = graph(&[
            (0, 1),
            (1, 2),
            (2, 3),
            (3, 0),
            (2, 4),
            (4, 5),
            (5, 6),
            (6, 2),
            (6, 7),
        ]);
        let mut ex = Expander::new(&g, vec![0, 1, 2, 6, 7], &UnitScore).unwrap();
        let stats = ex.optimize(&Deadline::unlimited(), 7, None).unwrap();
        assert!(stats.gained > 0);
        assert!(!stats.timed_out);
        assert_valid(&ex, 0, 7);
        let after = ex.trail().to_vec();

        let again = ex.optimize(&Deadline::unlimited(), 7, None).unwrap();
        assert_eq!(again.gained, 0);
        assert_eq!(again.passes, 1);
        assert_eq!(ex.trail(), after.as_slice());
    }

    #[test]
    fn test_weighted_scores_pick_valuable_detour() {
        // The detour 0-5-2 has as many edges as 0-1-2 but is worth more.
        let g = graph(&[(0, 1), (1, 2), (0, 5), (5, 2)]);
        let weight = |u: Vertex, v: Vertex| if u == 5 || v == 5 { 10 } else { 1 };
        let mut ex = Expander::new(&g, vec![0, 1, 2], &weight).unwrap();
        assert_eq!(ex.score(), 2);
        assert!(ex.expand(5).unwrap());
        assert_eq!(ex.trail(), &[0, 5, 2]);
        assert_eq!(ex.score(), 20);
    }

    #[test]
    fn test_expired_deadline_stops_immediately() {
        let g = graph(&[(0, 1), (1, 2), (0, 5), (5, 6), (6, 2)]);
        let mut ex = Expander::new(&g, vec![0, 1, 2], &UnitScore).unwrap();
        let deadline = Deadline::from_now(0.0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let stats = ex.optimize(&deadline, 0, None).unwrap();
        assert!(stats.timed_out);
        assert_eq!(ex.trail(), &[0, 1, 2]);
    }

    #[test]
    fn test_rejects_invalid_trail() {
        let g = graph(&[(0, 1), (1, 2)]);
        assert!(matches!(
            Expander::new(&g, vec![0, 2], &UnitScore),
            Err(GraphError::InvalidInput(_))
        ));
        assert!(matches!(
            Expander::new(&g, vec![], &UnitScore),
            Err(GraphError::InvalidInput(_))
        ));
        let mut ex = Expander::new(&g, vec![0, 1], &UnitScore).unwrap();
        assert!(ex.expand_cycle(5).is_err());
        assert_eq!(ex.expand(42), Err(GraphError::VertexNotFound(42)));
    }
}

//! # longtrail
//!
//! Long trails (edge-disjoint walks) through large sparse undirected
//! multigraphs, computed under a wall-clock budget.
//!
//! The engine decomposes a graph into 2-edge-connected blocks joined by
//! bridges, builds an Euler trail inside each block after trimming the odd
//! vertices that obstruct one, stitches the block trails together across the
//! bridges, and finally lengthens the result with a randomized local search
//! that reroutes the trail through unused edges.
//!
//! ```rust
//! use longtrail::{Multigraph, TrailConfig, TrailEngine};
//!
//! let g: Multigraph = [(0, 1), (1, 2), (2, 3), (3, 0), (3, 4)].into_iter().collect();
//! let mut engine = TrailEngine::new(TrailConfig::default());
//! engine.set_deadline(1.0);
//!
//! let trail = engine.build_trail(&g, 0, 4).unwrap();
//! assert_eq!(trail.num_edges(), 4);
//! assert_eq!(trail.first(), Some(0));
//! assert_eq!(trail.last(), Some(4));
//! ```

pub mod error;
pub mod graph;
pub mod timing;
pub mod trail;

pub use error::{GraphError, Result};
pub use graph::{BridgeForest, Edge, Multigraph, ShortestPaths, Vertex};
pub use timing::{Deadline, Timers};
pub use trail::{
    is_path_in_graph, CellValueScore, EdgeScore, Expander, LongestTrailCache, Trail, TrailConfig,
    TrailEngine, UnitScore,
};

//! Undirected multigraphs over sparse integer vertex ids and the structural
//! algorithms the trail engine is built from.

pub mod bridges;
pub mod hierholzer;
pub mod multigraph;
pub mod shortest_paths;

pub use bridges::{Block, BridgeForest};
pub use hierholzer::euler_trail;
pub use multigraph::{Edge, Multigraph, Vertex};
pub use shortest_paths::ShortestPaths;

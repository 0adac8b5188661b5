use thiserror::Error;

use crate::graph::Vertex;

/// Errors raised by graph and trail operations.
///
/// Every variant is a precondition violation or a broken invariant: the
/// caller handed in something malformed and the current computation is
/// aborted. Shorter-than-hoped trails and expired deadlines are not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("vertex {0} is not in the graph")]
    VertexNotFound(Vertex),

    #[error("edge ({0}, {1}) is not in the graph")]
    EdgeNotFound(Vertex, Vertex),

    #[error("self-loop at vertex {0} is not allowed")]
    SelfLoop(Vertex),

    #[error("block index {index} out of range for a forest of {len} blocks")]
    BlockOutOfRange { index: usize, len: usize },

    #[error("no Euler trail: {0}")]
    NotEulerian(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl GraphError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_eulerian(msg: impl Into<String>) -> Self {
        Self::NotEulerian(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

//! Error types for graph operations

/// Errors raised by [`crate::DirectedGraph`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Node is already present
    #[error("node already exists in graph: {0}")]
    DuplicateNode(String),

    /// Node is not part of the graph
    #[error("node does not exist in graph: {0}")]
    UnknownNode(String),

    /// Both nodes exist but no arc connects them
    #[error("no arc between {start} and {end}")]
    UnknownArc { start: String, end: String },
}

//! Error types for the metadata DAG.

use shroud_types::{TypeError, VertexId};

/// Errors that can occur during DAG operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DagError {
    /// A referenced vertex was not found in the DAG.
    #[error("vertex not found: {0:?}")]
    VertexNotFound(VertexId),

    /// A parent reference points to a vertex that does not exist.
    #[error("dangling parent reference: vertex {vertex:?} references missing parent {parent:?}")]
    DanglingParent {
        /// The vertex containing the bad reference.
        vertex: VertexId,
        /// The missing parent.
        parent: VertexId,
    },

    /// Malformed binary input. Never treated as an empty DAG.
    #[error("malformed DAG binary: {0}")]
    Parse(String),
}

impl From<TypeError> for DagError {
    fn from(e: TypeError) -> Self {
        DagError::Parse(e.to_string())
    }
}

/// Convenience alias for DAG results.
pub type DagResult<T> = Result<T, DagError>;

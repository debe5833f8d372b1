//! Engine errors.
//!
//! Collaborator failures are not errors at this level; they arrive as
//! [`FetchOutcome::Failed`](crate::source::FetchOutcome) and degrade the
//! graph instead of aborting an operation.

use thiserror::Error;

/// Errors returned by engine mutators
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),
}

impl EngineError {
    /// Create a node-not-found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound(id.into())
    }

    /// Create a not-a-directory error
    pub fn not_a_directory(id: impl Into<String>) -> Self {
        Self::NotADirectory(id.into())
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

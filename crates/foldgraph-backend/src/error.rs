//! Backend error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during backend operations.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] foldgraph_config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Namespace directory missing
    #[error("namespace directory not found at '{path}'")]
    NamespaceNotFound { path: PathBuf },

    /// Node ID outside the namespace or escaping it
    #[error("invalid node id '{id}': {reason}")]
    InvalidNodeId { id: String, reason: String },

    /// Remote server error
    #[error("remote server error: {status} - {message}")]
    RemoteServer { status: u16, message: String },

    /// Connection error
    #[error("connection failed: {0}")]
    Connection(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },
}

impl BackendError {
    /// Create a NamespaceNotFound error.
    pub fn namespace_not_found(path: impl Into<PathBuf>) -> Self {
        Self::NamespaceNotFound { path: path.into() }
    }

    /// Create an InvalidNodeId error.
    pub fn invalid_node_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a RemoteServer error.
    pub fn remote_server(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteServer {
            status,
            message: message.into(),
        }
    }

    /// Create a Connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Add context to any error.
    pub fn with_context(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackendError::namespace_not_found("/path/to/Notebook");
        assert!(err.to_string().contains("namespace directory not found"));
        assert!(err.to_string().contains("/path/to/Notebook"));

        let err = BackendError::invalid_node_id("Notebook/../etc", "escapes the namespace");
        assert!(err.to_string().contains("Notebook/../etc"));
        assert!(err.to_string().contains("escapes"));
    }

    #[test]
    fn test_remote_server_error() {
        let err = BackendError::remote_server(500, "Internal server error");
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("Internal server error"));
    }

    #[test]
    fn test_with_context() {
        let err = BackendError::with_context("writing bucket 'a'", "disk full");
        assert!(err.to_string().contains("writing bucket 'a'"));
        assert!(err.to_string().contains("disk full"));
    }
}

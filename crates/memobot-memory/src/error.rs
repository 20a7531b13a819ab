//! Error types for memory operations.

use std::path::PathBuf;

/// Errors returned by vector stores and helpers.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// No persisted store exists for the identity. Signals a cold start.
    #[error("no memory store for identity: {0}")]
    NotFound(String),
    /// Identity cannot be used as a storage key.
    #[error("invalid identity: {0:?}")]
    InvalidIdentity(String),
    /// Embedding provider failed.
    #[error("embedding error: {0}")]
    Embedding(String),
    /// Embedding dimension does not match the index.
    #[error("embedding dimension mismatch (expected={expected}, actual={actual})")]
    Dimension { expected: usize, actual: usize },
    /// Durable write of the index failed.
    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),
}

impl MemoryError {
    /// Whether this error is the cold-start signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MemoryError::NotFound(_))
    }
}

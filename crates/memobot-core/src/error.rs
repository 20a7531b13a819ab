//! Error types for the core crate.

use memobot_memory::MemoryError;
use memobot_protocol::TransportError;
use thiserror::Error;

/// Errors returned by core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Memory store error.
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
    /// Messaging transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Completion provider error.
    #[error("completion error: {0}")]
    Completion(String),
    /// Invalid runtime configuration.
    #[error("config error: {0}")]
    Config(String),
}

//! Per-identity vector memory for memobot.

pub mod assembler;
pub mod embedding;
pub mod error;
pub mod model;
pub mod policy;
pub mod provider;
pub mod store;

/// Memory assembly for prompts.
pub use assembler::assemble;
/// Embedding seam and similarity helper.
pub use embedding::{Embedder, cosine_similarity};
/// Memory error type.
pub use error::MemoryError;
/// Record model.
pub use model::{Identity, IndexedRecord, MemoryRecord, ScoredRecord};
/// Capture policy applied before persistence.
pub use policy::{CaptureFilter, MemoryCapturePolicy};
/// Directory-backed store provider.
pub use provider::VectorStoreProvider;
/// Vector memory store.
pub use store::VectorMemoryStore;

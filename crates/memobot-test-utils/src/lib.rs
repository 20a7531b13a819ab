//! Test helpers shared across memobot crates.

pub mod embedder;
pub mod events;
pub mod llm;
pub mod transport;

pub use embedder::LetterEmbedder;
pub use events::RecordingSink;
pub use llm::{FailingLLM, FixedChatResponse, ScriptedLLM};
pub use transport::{EditCall, RecordingTransport, SentMessage};

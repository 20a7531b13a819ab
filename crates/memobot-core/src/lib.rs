//! Turn orchestration and streaming reconciliation for memobot.

pub mod auth;
pub mod completion;
pub mod embedder;
pub mod error;
pub mod events;
pub mod locks;
pub mod orchestrator;
pub mod prompt;
pub mod streaming;

pub use auth::AllowList;
pub use completion::{CompletionStream, stream_completion};
pub use embedder::LlmEmbedder;
pub use error::CoreError;
pub use events::LogEventSink;
pub use locks::{TurnGuard, TurnLocks};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, TurnOutcome, TurnSettings};
pub use prompt::{ConversationWindows, DEFAULT_MAX_IDENTITIES, Exchange, PromptBuilder};
pub use streaming::{
    ReconcilerConfig, SessionState, StreamOutcome, StreamReconciler, StreamingSession,
};

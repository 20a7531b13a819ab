//! Wire types and collaborator contracts shared across memobot crates.

mod inbound;
mod transport;

pub use inbound::{InboundMessage, SenderPolicy};
pub use transport::{ChatRef, MessageRef, MessagingTransport, TransportError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation turn.
pub type TurnId = Uuid;

/// Events produced by a streaming chat completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum CompletionEvent {
    /// The provider accepted the request.
    Started,
    /// A text fragment arrived.
    Token(String),
    /// The provider finished; carries its canonical final text.
    Completed(String),
    /// The provider failed mid-stream.
    Failed(String),
}

/// Envelope around an [`EventPayload`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMsg {
    pub id: Uuid,
    /// Sender identity the turn ran for.
    pub identity: String,
    pub created_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl EventMsg {
    /// Build an event stamped with a fresh id and the current time.
    pub fn new(identity: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.into(),
            created_at: Utc::now(),
            payload,
        }
    }
}

/// Turn lifecycle events surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum EventPayload {
    /// Sender was rejected before any transport call.
    Unauthorized { sender: String },
    /// Turn started streaming into a placeholder message.
    TurnStarted { turn_id: TurnId, cold_start: bool },
    /// Turn finished and the answer was delivered.
    TurnCompleted {
        turn_id: TurnId,
        answer_len: usize,
        memory_saved: bool,
    },
    /// Completion provider failed; nothing was written to memory.
    TurnFailed { turn_id: TurnId, message: String },
    /// Streaming deadline elapsed before completion.
    TurnTimedOut {
        turn_id: TurnId,
        late_completion: bool,
    },
    /// The answer was delivered but the memory store could not be saved.
    MemoryPersistFailed { turn_id: TurnId, message: String },
    /// Any other error surfaced at the orchestrator boundary.
    Error {
        turn_id: Option<TurnId>,
        message: String,
    },
}

/// Receives orchestrator events. Must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EventMsg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn completion_event_uses_tagged_encoding() {
        let encoded = serde_json::to_value(CompletionEvent::Token("Hi".to_string()))
            .expect("serialize");
        assert_eq!(encoded, json!({ "type": "token", "payload": "Hi" }));
        let decoded: CompletionEvent =
            serde_json::from_value(json!({ "type": "started" })).expect("deserialize");
        assert_eq!(decoded, CompletionEvent::Started);
    }

    #[test]
    fn event_payload_round_trips_through_json() {
        let event = EventMsg::new(
            "42",
            EventPayload::TurnCompleted {
                turn_id: Uuid::new_v4(),
                answer_len: 8,
                memory_saved: true,
            },
        );
        let encoded = serde_json::to_value(&event).expect("serialize");
        let decoded: EventMsg = serde_json::from_value(encoded.clone()).expect("deserialize");
        assert_eq!(decoded.identity, "42");
        assert_eq!(decoded.payload, event.payload);
        assert_eq!(encoded["payload"]["type"], json!("turn_completed"));
    }
}

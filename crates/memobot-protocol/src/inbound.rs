use crate::transport::ChatRef;
use serde::{Deserialize, Serialize};

/// User message received from a messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Sender identity; keys the memory store and turn serialization.
    pub sender: String,
    /// Whether the sender is an automated account.
    #[serde(default)]
    pub sender_is_bot: bool,
    /// Chat the message arrived in; replies go here.
    pub chat: ChatRef,
    /// Platform message id, used to thread the reply.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Message text.
    pub text: String,
}

/// Decides whether a sender may start a turn.
pub trait SenderPolicy: Send + Sync {
    /// Return true when the sender is allowed.
    fn is_allowed(&self, sender: &str) -> bool;
}

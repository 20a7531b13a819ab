use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors returned by messaging transports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Request could not be delivered.
    #[error("http error: {0}")]
    Http(String),
    /// Remote API rejected the call.
    #[error("{method} rejected: {description}")]
    Api { method: String, description: String },
    /// Remote response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Conversation a message is sent into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatRef {
    /// Transport-specific chat identifier.
    pub chat_id: String,
}

impl ChatRef {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
        }
    }
}

/// Handle to a message that was sent and can be edited later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    /// Chat that owns the message.
    pub chat: ChatRef,
    /// Transport-specific message identifier.
    pub message_id: String,
}

/// Send/edit surface of a remote messaging platform.
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Transport name used in logs.
    fn name(&self) -> &str;

    /// Send a new message, optionally as a reply, and return its handle.
    async fn send(
        &self,
        chat: &ChatRef,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<MessageRef, TransportError>;

    /// Replace the text of an existing message.
    async fn edit(&self, message: &MessageRef, text: &str) -> Result<(), TransportError>;

    /// Show a typing indicator in the chat.
    async fn send_typing(&self, _chat: &ChatRef) -> Result<(), TransportError> {
        Ok(())
    }
}

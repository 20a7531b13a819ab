use async_trait::async_trait;
use memobot_protocol::{ChatRef, MessageRef, MessagingTransport, TransportError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// A `send` call observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: String,
    pub text: String,
    pub reply_to: Option<String>,
    pub message_id: String,
}

/// An `edit` attempt observed by [`RecordingTransport`], stamped when issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditCall {
    pub message_id: String,
    pub text: String,
    pub at: Instant,
}

/// In-memory transport that records calls and can inject failures and latency.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sends: Mutex<Vec<SentMessage>>,
    edits: Mutex<Vec<EditCall>>,
    typing: AtomicUsize,
    next_id: AtomicU64,
    fail_sends: AtomicBool,
    fail_edits: AtomicUsize,
    edit_delay: Option<Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every edit by `delay` before acknowledging it.
    pub fn with_edit_delay(mut self, delay: Duration) -> Self {
        self.edit_delay = Some(delay);
        self
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Reject the next `count` edits.
    pub fn fail_next_edits(&self, count: usize) {
        self.fail_edits.store(count, Ordering::SeqCst);
    }

    pub fn sends(&self) -> Vec<SentMessage> {
        self.sends.lock().clone()
    }

    pub fn edit_calls(&self) -> Vec<EditCall> {
        self.edits.lock().clone()
    }

    /// Texts of every edit attempt in issue order.
    pub fn edits(&self) -> Vec<String> {
        self.edits
            .lock()
            .iter()
            .map(|call| call.text.clone())
            .collect()
    }

    /// Edits issued against one message.
    pub fn edits_for(&self, message_id: &str) -> Vec<String> {
        self.edits
            .lock()
            .iter()
            .filter(|call| call.message_id == message_id)
            .map(|call| call.text.clone())
            .collect()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }

    /// Total number of send and edit calls.
    pub fn call_count(&self) -> usize {
        self.sends.lock().len() + self.edits.lock().len()
    }
}

#[async_trait]
impl MessagingTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(
        &self,
        chat: &ChatRef,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<MessageRef, TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Http("send rejected".to_string()));
        }
        let message_id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        self.sends.lock().push(SentMessage {
            chat_id: chat.chat_id.clone(),
            text: text.to_string(),
            reply_to: reply_to.map(str::to_string),
            message_id: message_id.clone(),
        });
        Ok(MessageRef {
            chat: chat.clone(),
            message_id,
        })
    }

    async fn edit(&self, message: &MessageRef, text: &str) -> Result<(), TransportError> {
        self.edits.lock().push(EditCall {
            message_id: message.message_id.clone(),
            text: text.to_string(),
            at: Instant::now(),
        });
        let fail = self
            .fail_edits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if let Some(delay) = self.edit_delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(TransportError::Api {
                method: "edit".to_string(),
                description: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    async fn send_typing(&self, _chat: &ChatRef) -> Result<(), TransportError> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

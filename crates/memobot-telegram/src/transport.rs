use crate::api::BotApi;
use async_trait::async_trait;
use log::debug;
use memobot_protocol::{ChatRef, MessageRef, MessagingTransport, TransportError};
use serde::Deserialize;
use serde_json::{Value, json};

/// Telegram rejects edits whose text equals the current text with this.
const NOT_MODIFIED: &str = "message is not modified";

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// [`MessagingTransport`] over the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    api: BotApi,
}

impl TelegramTransport {
    pub fn new(api: BotApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MessagingTransport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(
        &self,
        chat: &ChatRef,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<MessageRef, TransportError> {
        let mut body = json!({
            "chat_id": chat.chat_id,
            "text": text,
        });
        if let Some(id) = reply_to.and_then(|id| id.parse::<i64>().ok()) {
            body["reply_to_message_id"] = Value::from(id);
        }
        let sent: SentMessage = self.api.call("sendMessage", &body).await?;
        Ok(MessageRef {
            chat: chat.clone(),
            message_id: sent.message_id.to_string(),
        })
    }

    async fn edit(&self, message: &MessageRef, text: &str) -> Result<(), TransportError> {
        let message_id = message.message_id.parse::<i64>().map_err(|_| {
            TransportError::Decode(format!("invalid message id: {}", message.message_id))
        })?;
        let body = json!({
            "chat_id": message.chat.chat_id,
            "message_id": message_id,
            "text": text,
        });
        match self.api.call::<Value>("editMessageText", &body).await {
            Ok(_) => Ok(()),
            Err(TransportError::Api { description, .. }) if description.contains(NOT_MODIFIED) => {
                debug!("edit was a no-op (message_id={})", message.message_id);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn send_typing(&self, chat: &ChatRef) -> Result<(), TransportError> {
        let body = json!({
            "chat_id": chat.chat_id,
            "action": "typing",
        });
        self.api.call::<bool>("sendChatAction", &body).await?;
        Ok(())
    }
}

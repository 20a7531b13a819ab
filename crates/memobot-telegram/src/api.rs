//! Bot API client and wire types.

use memobot_protocol::{ChatRef, InboundMessage, TransportError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Timeout for send, edit and chat action calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Authenticated Bot API client shared by the transport and the listener.
#[derive(Clone)]
pub struct BotApi {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl fmt::Debug for BotApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotApi")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl BotApi {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), token, api_base)
    }

    pub fn with_client(
        client: reqwest::Client,
        token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    pub(crate) fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    /// POST `body` to `method` and unwrap the `{ok, result, description}`
    /// envelope. Errors never carry the request URL.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<T, TransportError> {
        self.call_with_timeout(method, body, REQUEST_TIMEOUT).await
    }

    pub(crate) async fn call_with_timeout<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| TransportError::Http(err.without_url().to_string()))?;
        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|err| {
            if status.is_success() {
                TransportError::Decode(format!("{method}: {}", err.without_url()))
            } else {
                TransportError::Http(format!("{method} returned {status}"))
            }
        })?;
        envelope.into_result(method)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T, TransportError> {
        if !self.ok {
            return Err(TransportError::Api {
                method: method.to_string(),
                description: self
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        self.result
            .ok_or_else(|| TransportError::Decode(format!("{method} returned ok without result")))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Convert an update into an inbound message. Only text messages with a
/// sender are kept; the sender identity is the numeric user id.
pub fn parse_update(update: Update) -> Option<InboundMessage> {
    let message = update.message?;
    let from = message.from?;
    let text = message.text?;
    Some(InboundMessage {
        sender: from.id.to_string(),
        sender_is_bot: from.is_bot,
        chat: ChatRef::new(message.chat.id.to_string()),
        message_id: Some(message.message_id.to_string()),
        text,
    })
}

#[cfg(test)]
mod tests {
    use super::{BotApi, Update, parse_update};
    use memobot_protocol::ChatRef;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn update(value: serde_json::Value) -> Update {
        serde_json::from_value(value).expect("update")
    }

    #[test]
    fn api_url_joins_base_token_and_method() {
        let api = BotApi::new("123:ABC", "https://api.telegram.org/");
        assert_eq!(
            api.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn debug_output_hides_token() {
        let api = BotApi::new("123:SECRET", "https://api.telegram.org");
        assert_eq!(format!("{api:?}").contains("SECRET"), false);
    }

    #[test]
    fn parse_text_message() {
        let parsed = parse_update(update(json!({
            "update_id": 7,
            "message": {
                "message_id": 55,
                "date": 1700000000,
                "from": {"id": 1001, "is_bot": false, "username": "alice"},
                "chat": {"id": -42, "type": "group"},
                "text": "Hello"
            }
        })))
        .expect("message");

        assert_eq!(parsed.sender, "1001");
        assert_eq!(parsed.sender_is_bot, false);
        assert_eq!(parsed.chat, ChatRef::new("-42"));
        assert_eq!(parsed.message_id.as_deref(), Some("55"));
        assert_eq!(parsed.text, "Hello");
    }

    #[test]
    fn parse_keeps_bot_flag() {
        let parsed = parse_update(update(json!({
            "update_id": 8,
            "message": {
                "message_id": 1,
                "from": {"id": 9, "is_bot": true},
                "chat": {"id": 9},
                "text": "beep"
            }
        })))
        .expect("message");
        assert_eq!(parsed.sender_is_bot, true);
    }

    #[test]
    fn parse_skips_non_text_and_senderless_updates() {
        let photo = update(json!({
            "update_id": 9,
            "message": {
                "message_id": 2,
                "from": {"id": 1, "is_bot": false},
                "chat": {"id": 1},
                "photo": []
            }
        }));
        let channel_post = update(json!({
            "update_id": 10,
            "message": {"message_id": 3, "chat": {"id": 1}, "text": "hi"}
        }));
        let edited = update(json!({"update_id": 11, "edited_message": {}}));

        assert_eq!(parse_update(photo).is_none(), true);
        assert_eq!(parse_update(channel_post).is_none(), true);
        assert_eq!(parse_update(edited).is_none(), true);
    }
}

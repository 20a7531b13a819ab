use crate::api::{BotApi, Update, parse_update};
use log::{debug, info, warn};
use memobot_protocol::{InboundMessage, TransportError};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

/// Pause after a failed poll before retrying.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Extra time on top of the long-poll timeout before giving up on a request.
const POLL_SLACK: Duration = Duration::from_secs(10);

/// Long-polls `getUpdates` and forwards text messages.
#[derive(Debug)]
pub struct TelegramListener {
    api: BotApi,
    poll_timeout_secs: u64,
    offset: i64,
}

impl TelegramListener {
    pub fn new(api: BotApi, poll_timeout_secs: u64) -> Self {
        Self {
            api,
            poll_timeout_secs,
            offset: 0,
        }
    }

    /// Next update id that will be requested.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Fetch one batch of updates and advance the offset past it.
    pub async fn poll_once(&mut self) -> Result<Vec<InboundMessage>, TransportError> {
        let body = json!({
            "offset": self.offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });
        let timeout = Duration::from_secs(self.poll_timeout_secs) + POLL_SLACK;
        let updates: Vec<Update> = self
            .api
            .call_with_timeout("getUpdates", &body, timeout)
            .await?;
        if let Some(last) = updates.iter().map(|update| update.update_id).max() {
            self.offset = last + 1;
        }
        let received = updates.len();
        let messages: Vec<InboundMessage> = updates.into_iter().filter_map(parse_update).collect();
        if received > 0 {
            debug!(
                "polled updates (received={}, messages={}, offset={})",
                received,
                messages.len(),
                self.offset
            );
        }
        Ok(messages)
    }

    /// Poll until the receiving side of `tx` is dropped.
    pub async fn run(mut self, tx: mpsc::Sender<InboundMessage>) {
        info!(
            "telegram listener started (poll_timeout_secs={})",
            self.poll_timeout_secs
        );
        loop {
            let messages = match self.poll_once().await {
                Ok(messages) => messages,
                Err(err) => {
                    warn!("telegram poll failed (error={})", err);
                    tokio::time::sleep(RETRY_DELAY).await;
                    continue;
                }
            };
            for message in messages {
                if tx.send(message).await.is_err() {
                    info!("telegram listener stopped");
                    return;
                }
            }
            if tx.is_closed() {
                info!("telegram listener stopped");
                return;
            }
        }
    }
}

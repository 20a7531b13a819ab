//! Adapter from an `autoagents-llm` chat stream to completion events.

use autoagents_llm::LLMProvider;
use autoagents_llm::chat::{ChatMessage, ChatProvider, StreamChunk};
use futures_util::StreamExt;
use log::{debug, warn};
use memobot_protocol::CompletionEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Buffered events between the provider task and the reconciler.
const EVENT_BUFFER: usize = 64;

/// Stream of completion events for one request.
pub type CompletionStream = ReceiverStream<CompletionEvent>;

/// Start a streaming chat request on a background task.
///
/// Emits `Started`, then one `Token` per text chunk, then exactly one of
/// `Completed` (carrying the concatenated text) or `Failed`. The task stops
/// early once the receiver is dropped.
pub fn stream_completion(
    llm: Arc<dyn LLMProvider>,
    messages: Vec<ChatMessage>,
) -> CompletionStream {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(produce(llm, messages, tx));
    ReceiverStream::new(rx)
}

async fn produce(
    llm: Arc<dyn LLMProvider>,
    messages: Vec<ChatMessage>,
    tx: mpsc::Sender<CompletionEvent>,
) {
    let mut stream = match llm.chat_stream_with_tools(&messages, None, None).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!("completion request failed (error={})", err);
            let _ = tx.send(CompletionEvent::Failed(err.to_string())).await;
            return;
        }
    };
    if tx.send(CompletionEvent::Started).await.is_err() {
        return;
    }

    let mut final_text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(StreamChunk::Text(text)) => {
                if text.is_empty() {
                    continue;
                }
                final_text.push_str(&text);
                if tx.send(CompletionEvent::Token(text)).await.is_err() {
                    debug!("completion receiver dropped; stopping stream");
                    return;
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    "completion stream failed (received_len={}, error={})",
                    final_text.len(),
                    err
                );
                let _ = tx.send(CompletionEvent::Failed(err.to_string())).await;
                return;
            }
        }
    }
    debug!("completion finished (len={})", final_text.len());
    let _ = tx.send(CompletionEvent::Completed(final_text)).await;
}

#[cfg(test)]
mod tests {
    use super::stream_completion;
    use autoagents_llm::chat::{ChatMessage, ChatRole, MessageType};
    use futures_util::StreamExt;
    use memobot_protocol::CompletionEvent;
    use memobot_test_utils::{FailingLLM, ScriptedLLM};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn question() -> Vec<ChatMessage> {
        vec![ChatMessage {
            role: ChatRole::User,
            message_type: MessageType::Text,
            content: "hi".to_string(),
        }]
    }

    #[tokio::test]
    async fn emits_tokens_then_concatenated_completion() {
        let llm = Arc::new(ScriptedLLM::new(["Hel", "", "lo"]));
        let events: Vec<CompletionEvent> =
            stream_completion(llm.clone(), question()).collect().await;

        assert_eq!(
            events,
            vec![
                CompletionEvent::Started,
                CompletionEvent::Token("Hel".to_string()),
                CompletionEvent::Token("lo".to_string()),
                CompletionEvent::Completed("Hello".to_string()),
            ]
        );
        assert_eq!(llm.last_messages.lock()[0].content, "hi");
    }

    #[tokio::test]
    async fn request_error_is_a_failed_event() {
        let llm = Arc::new(FailingLLM::new("quota exceeded"));
        let events: Vec<CompletionEvent> = stream_completion(llm, question()).collect().await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            CompletionEvent::Failed(message) => assert!(message.contains("quota exceeded")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn mid_stream_error_ends_with_failed() {
        let llm = Arc::new(ScriptedLLM::new(["par"]).failing_after("connection reset"));
        let events: Vec<CompletionEvent> = stream_completion(llm, question()).collect().await;

        assert_eq!(events[0], CompletionEvent::Started);
        assert_eq!(events[1], CompletionEvent::Token("par".to_string()));
        assert_eq!(events.len(), 3);
        assert_eq!(matches!(events[2], CompletionEvent::Failed(_)), true);
    }
}

//! Default event sink that forwards turn events to the log.

use log::{info, warn};
use memobot_protocol::{EventMsg, EventPayload, EventSink};

/// Logs every orchestrator event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: EventMsg) {
        let identity = event.identity;
        match event.payload {
            EventPayload::Unauthorized { sender } => {
                warn!("rejected sender (identity={}, sender={})", identity, sender);
            }
            EventPayload::TurnStarted {
                turn_id,
                cold_start,
            } => {
                info!(
                    "turn started (identity={}, turn_id={}, cold_start={})",
                    identity, turn_id, cold_start
                );
            }
            EventPayload::TurnCompleted {
                turn_id,
                answer_len,
                memory_saved,
            } => {
                info!(
                    "turn completed (identity={}, turn_id={}, answer_len={}, memory_saved={})",
                    identity, turn_id, answer_len, memory_saved
                );
            }
            EventPayload::TurnFailed { turn_id, message } => {
                warn!(
                    "turn failed (identity={}, turn_id={}, error={})",
                    identity, turn_id, message
                );
            }
            EventPayload::TurnTimedOut {
                turn_id,
                late_completion,
            } => {
                warn!(
                    "turn timed out (identity={}, turn_id={}, late_completion={})",
                    identity, turn_id, late_completion
                );
            }
            EventPayload::MemoryPersistFailed { turn_id, message } => {
                warn!(
                    "memory persistence failed (identity={}, turn_id={}, error={})",
                    identity, turn_id, message
                );
            }
            EventPayload::Error { turn_id, message } => {
                warn!(
                    "turn error (identity={}, turn_id={:?}, error={})",
                    identity, turn_id, message
                );
            }
        }
    }
}

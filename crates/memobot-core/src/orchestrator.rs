//! Conversation turn orchestration.
//!
//! One call to [`Orchestrator::handle_message`] runs a full turn: authorize,
//! recall memory, stream the completion into a placeholder message, then
//! remember the exchange. Turns of one identity are serialized.

use crate::auth::AllowList;
use crate::completion::stream_completion;
use crate::error::CoreError;
use crate::events::LogEventSink;
use crate::locks::TurnLocks;
use crate::prompt::{ConversationWindows, Exchange, PromptBuilder};
use crate::streaming::{ReconcilerConfig, StreamOutcome, StreamReconciler};
use autoagents_llm::LLMProvider;
use log::{debug, info, warn};
use memobot_config::MemobotConfig;
use memobot_memory::{
    CaptureFilter, Identity, MemoryCapturePolicy, MemoryError, MemoryRecord, VectorMemoryStore,
    VectorStoreProvider, assemble,
};
use memobot_protocol::{
    EventMsg, EventPayload, EventSink, InboundMessage, MessagingTransport, SenderPolicy, TurnId,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Result of handling one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Sender rejected; no transport call was made.
    Unauthorized,
    /// Message had no text to answer.
    Ignored,
    /// Turn could not start streaming.
    Aborted { error: String },
    /// Answer delivered; `memory_saved` reports whether it was persisted.
    Completed { turn_id: TurnId, memory_saved: bool },
    /// Completion provider failed; nothing was remembered.
    Failed { turn_id: TurnId, error: String },
    /// Streaming deadline elapsed; nothing was remembered.
    TimedOut {
        turn_id: TurnId,
        late_completion: bool,
    },
}

/// Per-turn settings taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSettings {
    pub recall_k: usize,
    pub placeholder: String,
    pub failure_notice: String,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self::from(&MemobotConfig::default())
    }
}

impl From<&MemobotConfig> for TurnSettings {
    fn from(config: &MemobotConfig) -> Self {
        Self {
            recall_k: config.memory.recall_k,
            placeholder: config.conversation.placeholder.clone(),
            failure_notice: config.conversation.failure_notice.clone(),
        }
    }
}

/// Ties memory, completion streaming and the transport together.
pub struct Orchestrator {
    llm: Arc<dyn LLMProvider>,
    transport: Arc<dyn MessagingTransport>,
    memory: VectorStoreProvider,
    sender_policy: Arc<dyn SenderPolicy>,
    event_sink: Arc<dyn EventSink>,
    capture: CaptureFilter,
    reconciler: StreamReconciler,
    prompt: PromptBuilder,
    windows: ConversationWindows,
    locks: TurnLocks,
    settings: TurnSettings,
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    llm: Arc<dyn LLMProvider>,
    transport: Arc<dyn MessagingTransport>,
    memory: VectorStoreProvider,
    sender_policy: Option<Arc<dyn SenderPolicy>>,
    event_sink: Option<Arc<dyn EventSink>>,
    config: MemobotConfig,
}

impl OrchestratorBuilder {
    /// Replace the runtime configuration (defaults otherwise).
    pub fn config(mut self, config: MemobotConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the sender policy. Defaults to the configured allow list.
    pub fn sender_policy(mut self, policy: Arc<dyn SenderPolicy>) -> Self {
        self.sender_policy = Some(policy);
        self
    }

    /// Replace the event sink. Defaults to logging.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Orchestrator, CoreError> {
        let config = self.config;
        config
            .validate()
            .map_err(|err| CoreError::Config(err.to_string()))?;
        let capture_config = &config.memory.capture;
        let capture = CaptureFilter::new(MemoryCapturePolicy {
            redact_patterns: capture_config.redact_patterns.clone(),
            detect_secrets: capture_config.detect_secrets,
            secret_entropy_threshold: capture_config.secret_entropy_threshold,
            max_record_chars: capture_config.max_record_chars,
            redaction_replacement: capture_config.redaction_replacement.clone(),
        })?;
        let sender_policy: Arc<dyn SenderPolicy> = match self.sender_policy {
            Some(policy) => policy,
            None => Arc::new(AllowList::new(config.telegram.allowed_users.clone())),
        };
        let event_sink: Arc<dyn EventSink> = match self.event_sink {
            Some(sink) => sink,
            None => Arc::new(LogEventSink),
        };
        let reconciler = StreamReconciler::new(
            self.transport.clone(),
            ReconcilerConfig::from(&config.streaming),
        );
        info!(
            "orchestrator ready (transport={}, recall_k={}, window_turns={})",
            self.transport.name(),
            config.memory.recall_k,
            config.conversation.window_turns
        );
        Ok(Orchestrator {
            llm: self.llm,
            transport: self.transport,
            memory: self.memory,
            sender_policy,
            event_sink,
            capture,
            reconciler,
            prompt: PromptBuilder::new(config.conversation.persona.clone()),
            windows: ConversationWindows::new(config.conversation.window_turns),
            locks: TurnLocks::new(),
            settings: TurnSettings::from(&config),
        })
    }
}

impl Orchestrator {
    pub fn builder(
        llm: Arc<dyn LLMProvider>,
        transport: Arc<dyn MessagingTransport>,
        memory: VectorStoreProvider,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            llm,
            transport,
            memory,
            sender_policy: None,
            event_sink: None,
            config: MemobotConfig::default(),
        }
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    /// Handle one inbound message end to end. Never panics on provider,
    /// transport or storage failures; they are reported in the outcome and
    /// through the event sink.
    pub async fn handle_message(&self, inbound: InboundMessage) -> TurnOutcome {
        if inbound.sender_is_bot || !self.sender_policy.is_allowed(&inbound.sender) {
            self.emit(
                &inbound.sender,
                EventPayload::Unauthorized {
                    sender: inbound.sender.clone(),
                },
            );
            return TurnOutcome::Unauthorized;
        }
        let question = inbound.text.trim();
        if question.is_empty() {
            debug!("ignoring empty message (sender={})", inbound.sender);
            return TurnOutcome::Ignored;
        }
        let identity = match Identity::parse(inbound.sender.as_str()) {
            Ok(identity) => identity,
            Err(err) => {
                self.emit(
                    &inbound.sender,
                    EventPayload::Error {
                        turn_id: None,
                        message: err.to_string(),
                    },
                );
                return TurnOutcome::Aborted {
                    error: err.to_string(),
                };
            }
        };

        let _turn = self.locks.acquire(identity.as_str()).await;
        self.run_turn(&identity, &inbound, question).await
    }

    async fn run_turn(
        &self,
        identity: &Identity,
        inbound: &InboundMessage,
        question: &str,
    ) -> TurnOutcome {
        let turn_id = Uuid::new_v4();
        let (store, writable) = match self.memory.try_load(identity) {
            Ok(store) => (store, true),
            Err(err) => {
                warn!(
                    "memory unavailable; answering without it (identity={}, error={})",
                    identity, err
                );
                self.emit(
                    identity.as_str(),
                    EventPayload::Error {
                        turn_id: Some(turn_id),
                        message: format!("memory unavailable: {err}"),
                    },
                );
                (None, false)
            }
        };
        let cold_start = store.is_none();
        let recalled = match assemble(store.as_ref(), question, self.settings.recall_k).await {
            Ok(text) => text,
            Err(err) => {
                warn!("memory recall failed (identity={}, error={})", identity, err);
                String::new()
            }
        };

        if let Err(err) = self.transport.send_typing(&inbound.chat).await {
            debug!("typing indicator failed (identity={}, error={})", identity, err);
        }
        let mut session = match self
            .reconciler
            .open(
                &inbound.chat,
                inbound.message_id.as_deref(),
                &self.settings.placeholder,
            )
            .await
        {
            Ok(session) => session,
            Err(err) => {
                let err = CoreError::from(err);
                self.emit(
                    identity.as_str(),
                    EventPayload::Error {
                        turn_id: Some(turn_id),
                        message: err.to_string(),
                    },
                );
                return TurnOutcome::Aborted {
                    error: err.to_string(),
                };
            }
        };
        self.emit(
            identity.as_str(),
            EventPayload::TurnStarted {
                turn_id,
                cold_start,
            },
        );

        let history = self.windows.recent(identity.as_str());
        let messages = self.prompt.build(&history, &recalled, question);
        let events = stream_completion(self.llm.clone(), messages);

        match self.reconciler.drive(&mut session, events).await {
            StreamOutcome::Completed { final_text } => {
                let exchange = Exchange::new(question, final_text);
                self.windows.push(identity.as_str(), exchange.clone());
                let memory_saved = if writable {
                    match self.remember(identity, store, &exchange).await {
                        Ok(()) => true,
                        Err(err) => {
                            self.emit(
                                identity.as_str(),
                                EventPayload::MemoryPersistFailed {
                                    turn_id,
                                    message: err.to_string(),
                                },
                            );
                            false
                        }
                    }
                } else {
                    false
                };
                self.emit(
                    identity.as_str(),
                    EventPayload::TurnCompleted {
                        turn_id,
                        answer_len: exchange.answer.len(),
                        memory_saved,
                    },
                );
                TurnOutcome::Completed {
                    turn_id,
                    memory_saved,
                }
            }
            StreamOutcome::Failed { error } => {
                let err = CoreError::Completion(error);
                if !self.settings.failure_notice.is_empty()
                    && let Err(notice_err) = self
                        .transport
                        .edit(session.target(), &self.settings.failure_notice)
                        .await
                {
                    debug!(
                        "failure notice not delivered (identity={}, error={})",
                        identity, notice_err
                    );
                }
                self.emit(
                    identity.as_str(),
                    EventPayload::TurnFailed {
                        turn_id,
                        message: err.to_string(),
                    },
                );
                TurnOutcome::Failed {
                    turn_id,
                    error: err.to_string(),
                }
            }
            StreamOutcome::TimedOut { late_final } => {
                let late_completion = late_final.is_some();
                self.emit(
                    identity.as_str(),
                    EventPayload::TurnTimedOut {
                        turn_id,
                        late_completion,
                    },
                );
                TurnOutcome::TimedOut {
                    turn_id,
                    late_completion,
                }
            }
        }
    }

    /// Append the exchange to the identity's store and save it, creating the
    /// store on the first turn.
    async fn remember(
        &self,
        identity: &Identity,
        store: Option<VectorMemoryStore>,
        exchange: &Exchange,
    ) -> Result<(), MemoryError> {
        let content = self.capture.apply(&exchange.record_content());
        let record = MemoryRecord::new(content).with_metadata(json!({
            "kind": "turn",
            "identity": identity.as_str(),
        }));
        let store = match store {
            Some(mut store) => {
                store.append(vec![record]).await?;
                store
            }
            None => {
                self.memory
                    .create_from_records(identity, vec![record])
                    .await?
            }
        };
        store.save()
    }

    fn emit(&self, identity: &str, payload: EventPayload) {
        self.event_sink.emit(EventMsg::new(identity, payload));
    }
}

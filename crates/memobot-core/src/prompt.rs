//! Prompt assembly and the short-term conversation window.

use autoagents_llm::chat::{ChatMessage, ChatRole, MessageType};
use log::debug;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

/// One completed question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

impl Exchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Canonical long-term memory content for this exchange.
    pub fn record_content(&self) -> String {
        format!("Human:{} AI:{}", self.question, self.answer)
    }
}

/// Identities whose windows are kept before the least recently active one is
/// evicted.
pub const DEFAULT_MAX_IDENTITIES: usize = 1024;

/// Bounded recent history per identity, kept in process memory only.
#[derive(Debug)]
pub struct ConversationWindows {
    capacity: usize,
    max_identities: usize,
    state: RwLock<WindowState>,
}

#[derive(Debug, Default)]
struct WindowState {
    clock: u64,
    windows: HashMap<String, Window>,
}

#[derive(Debug, Default)]
struct Window {
    last_push: u64,
    exchanges: VecDeque<Exchange>,
}

impl ConversationWindows {
    /// Keep at most `capacity` exchanges per identity; 0 disables the window.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            max_identities: DEFAULT_MAX_IDENTITIES,
            state: RwLock::new(WindowState::default()),
        }
    }

    /// Cap on the number of identities with a window.
    pub fn with_max_identities(mut self, max_identities: usize) -> Self {
        self.max_identities = max_identities.max(1);
        self
    }

    /// Oldest-first exchanges for `identity`.
    pub fn recent(&self, identity: &str) -> Vec<Exchange> {
        self.state
            .read()
            .windows
            .get(identity)
            .map(|window| window.exchanges.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of identities currently holding a window.
    pub fn len(&self) -> usize {
        self.state.read().windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, identity: &str, exchange: Exchange) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.state.write();
        state.clock += 1;
        let now = state.clock;
        if !state.windows.contains_key(identity) && state.windows.len() >= self.max_identities {
            let idle = state
                .windows
                .iter()
                .min_by_key(|(_, window)| window.last_push)
                .map(|(key, _)| key.clone());
            if let Some(idle) = idle {
                debug!("evicting conversation window (identity={})", idle);
                state.windows.remove(&idle);
            }
        }
        let window = state.windows.entry(identity.to_string()).or_default();
        window.last_push = now;
        window.exchanges.push_back(exchange);
        while window.exchanges.len() > self.capacity {
            window.exchanges.pop_front();
        }
    }
}

/// Renders the chat messages sent to the provider for one turn.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
}

impl PromptBuilder {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
        }
    }

    /// Persona as a system message, then history as alternating
    /// user/assistant messages, then one user message carrying the recalled
    /// memory and the question.
    pub fn build(&self, history: &[Exchange], memory: &str, question: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        let persona = self.persona.trim();
        if !persona.is_empty() {
            messages.push(text_message(ChatRole::System, persona));
        }
        for exchange in history {
            messages.push(text_message(ChatRole::User, &exchange.question));
            messages.push(text_message(ChatRole::Assistant, &exchange.answer));
        }
        messages.push(text_message(ChatRole::User, &render(memory, question)));
        messages
    }
}

const MEMORY_HEADING: &str = "Earlier conversations with this user that may be relevant:";

fn render(memory: &str, question: &str) -> String {
    let memory = memory.trim();
    if memory.is_empty() {
        return format!("Human: {question}\nAI:");
    }
    format!("{MEMORY_HEADING}\n{memory}\n\nHuman: {question}\nAI:")
}

fn text_message(role: ChatRole, content: &str) -> ChatMessage {
    ChatMessage {
        role,
        message_type: MessageType::Text,
        content: content.to_string(),
    }
}

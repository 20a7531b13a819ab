//! Configuration schema for memobot.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding the provider base URL.
pub const ENV_BASE_PATH: &str = "BASE_PATH";
/// Environment variable listing extra allowed senders (comma separated).
pub const ENV_USER_ID: &str = "USER_ID";
/// Environment variable overriding the chat model.
pub const ENV_MODEL: &str = "MEMOBOT_MODEL";

/// Root config for the memobot service.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MemobotConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl MemobotConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using a custom variable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(model) = non_empty(lookup(ENV_MODEL)) {
            self.provider.model = model;
        }
        if let Some(base_url) = non_empty(lookup(ENV_BASE_PATH)) {
            self.provider.base_url = Some(base_url);
        }
        if let Some(users) = lookup(ENV_USER_ID) {
            for user in users.split(',').map(str::trim).filter(|user| !user.is_empty()) {
                if !self.telegram.allowed_users.iter().any(|known| known == user) {
                    self.telegram.allowed_users.push(user.to_string());
                }
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Chat/embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// OpenAI-compatible endpoint override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Long-term memory settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    /// Root directory for per-identity stores.
    #[serde(default)]
    pub path: Option<String>,
    /// Number of records recalled per turn.
    #[serde(default = "default_recall_k")]
    pub recall_k: usize,
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            recall_k: default_recall_k(),
            capture: CaptureConfig::default(),
        }
    }
}

fn default_recall_k() -> usize {
    3
}

/// Capture policy applied before a turn is written to memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    #[serde(default)]
    pub redact_patterns: Vec<String>,
    #[serde(default = "default_detect_secrets")]
    pub detect_secrets: bool,
    #[serde(default = "default_secret_entropy_threshold")]
    pub secret_entropy_threshold: f32,
    #[serde(default)]
    pub max_record_chars: Option<usize>,
    #[serde(default = "default_redaction_replacement")]
    pub redaction_replacement: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            redact_patterns: Vec::new(),
            detect_secrets: default_detect_secrets(),
            secret_entropy_threshold: default_secret_entropy_threshold(),
            max_record_chars: None,
            redaction_replacement: default_redaction_replacement(),
        }
    }
}

fn default_detect_secrets() -> bool {
    true
}

fn default_secret_entropy_threshold() -> f32 {
    3.7
}

fn default_redaction_replacement() -> String {
    "[REDACTED]".to_string()
}

/// Prompt and user-facing message settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationConfig {
    /// Question/answer pairs kept in the short-term window.
    #[serde(default = "default_window_turns")]
    pub window_turns: usize,
    #[serde(default = "default_persona")]
    pub persona: String,
    /// Text of the message sent before streaming begins.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    /// Edited into the reply when a completion fails. Empty disables it.
    #[serde(default = "default_failure_notice")]
    pub failure_notice: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            window_turns: default_window_turns(),
            persona: default_persona(),
            placeholder: default_placeholder(),
            failure_notice: default_failure_notice(),
        }
    }
}

fn default_window_turns() -> usize {
    4
}

fn default_persona() -> String {
    "You are a friendly assistant that remembers earlier conversations with this user."
        .to_string()
}

fn default_placeholder() -> String {
    "...".to_string()
}

fn default_failure_notice() -> String {
    "Sorry, I could not finish that answer.".to_string()
}

/// Streaming reconciliation timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamingConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// How long a timed out session still waits for a late completion.
    #[serde(default = "default_late_completion_grace_ms")]
    pub late_completion_grace_ms: u64,
}

impl StreamingConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn late_completion_grace(&self) -> Duration {
        Duration::from_millis(self.late_completion_grace_ms)
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            deadline_ms: default_deadline_ms(),
            late_completion_grace_ms: default_late_completion_grace_ms(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_deadline_ms() -> u64 {
    30_000
}

fn default_late_completion_grace_ms() -> u64 {
    30_000
}

/// Telegram transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelegramConfig {
    /// Sender ids allowed to talk to the bot.
    #[serde(default)]
    pub allowed_users: Vec<String>,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            allowed_users: Vec::new(),
            poll_timeout_secs: default_poll_timeout_secs(),
            api_base: default_api_base(),
        }
    }
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

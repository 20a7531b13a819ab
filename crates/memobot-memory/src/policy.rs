//! Capture policy applied to records before they are persisted.

use crate::error::MemoryError;
use regex::Regex;
use std::collections::HashMap;

/// Policy for deciding what ends up in long-term memory.
#[derive(Debug, Clone)]
pub struct MemoryCapturePolicy {
    /// Patterns to redact from captured content.
    pub redact_patterns: Vec<String>,
    /// Detect secrets using entropy heuristics.
    pub detect_secrets: bool,
    /// Entropy threshold for secret detection.
    pub secret_entropy_threshold: f32,
    /// Optional maximum record length in characters.
    pub max_record_chars: Option<usize>,
    /// Replacement string for redactions.
    pub redaction_replacement: String,
}

impl Default for MemoryCapturePolicy {
    fn default() -> Self {
        Self {
            redact_patterns: Vec::new(),
            detect_secrets: true,
            secret_entropy_threshold: 3.7,
            max_record_chars: None,
            redaction_replacement: "[REDACTED]".to_string(),
        }
    }
}

/// Compiled form of [`MemoryCapturePolicy`].
#[derive(Debug, Clone)]
pub struct CaptureFilter {
    policy: MemoryCapturePolicy,
    redactions: Vec<Regex>,
}

/// Tokens shorter than this are never treated as secrets.
const MIN_SECRET_LEN: usize = 20;

impl CaptureFilter {
    /// Compile the policy's redaction patterns.
    pub fn new(policy: MemoryCapturePolicy) -> Result<Self, MemoryError> {
        let redactions = policy
            .redact_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| MemoryError::Regex(format!("{pattern}: {err}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { policy, redactions })
    }

    pub fn policy(&self) -> &MemoryCapturePolicy {
        &self.policy
    }

    /// Redact, mask secrets, then truncate.
    pub fn apply(&self, content: &str) -> String {
        let replacement = self.policy.redaction_replacement.as_str();
        let mut output = content.to_string();
        for regex in &self.redactions {
            output = regex.replace_all(&output, replacement).into_owned();
        }
        if self.policy.detect_secrets {
            output = mask_secrets(&output, self.policy.secret_entropy_threshold, replacement);
        }
        if let Some(max) = self.policy.max_record_chars {
            output = truncate_chars(&output, max);
        }
        output
    }
}

/// Replace secret-looking tokens, keeping every whitespace run as written.
fn mask_secrets(content: &str, threshold: f32, replacement: &str) -> String {
    let mut output = String::with_capacity(content.len());
    let mut rest = content;
    while !rest.is_empty() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let (token, tail) = rest.split_at(end);
        if looks_like_secret(token, threshold) {
            output.push_str(replacement);
        } else {
            output.push_str(token);
        }
        let gap = tail
            .find(|ch: char| !ch.is_whitespace())
            .unwrap_or(tail.len());
        output.push_str(&tail[..gap]);
        rest = &tail[gap..];
    }
    output
}

fn looks_like_secret(token: &str, threshold: f32) -> bool {
    if token.contains("://") {
        return false;
    }
    let trimmed = token.trim_matches(|ch: char| !ch.is_ascii_alphanumeric());
    if trimmed.chars().count() < MIN_SECRET_LEN || is_hex_digest(trimmed) {
        return false;
    }
    let has_digit = trimmed.chars().any(|ch| ch.is_ascii_digit());
    let has_alpha = trimmed.chars().any(|ch| ch.is_ascii_alphabetic());
    has_digit && has_alpha && shannon_entropy(trimmed) >= threshold
}

/// Commit hashes, checksums and UUIDs.
fn is_hex_digest(value: &str) -> bool {
    value
        .chars()
        .all(|ch| ch.is_ascii_hexdigit() || ch == '-')
}

/// Shannon entropy in bits per character.
pub fn shannon_entropy(value: &str) -> f32 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for ch in value.chars() {
        *counts.entry(ch).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    let total = total as f32;
    counts
        .values()
        .map(|count| {
            let p = *count as f32 / total;
            -p * p.log2()
        })
        .sum()
}

/// Keep at most `max` characters, respecting char boundaries.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::{CaptureFilter, MemoryCapturePolicy, shannon_entropy, truncate_chars};
    use pretty_assertions::assert_eq;

    #[test]
    fn redacts_configured_patterns() {
        let filter = CaptureFilter::new(MemoryCapturePolicy {
            redact_patterns: vec![r"\b\d{3}-\d{4}\b".to_string()],
            detect_secrets: false,
            ..MemoryCapturePolicy::default()
        })
        .expect("filter");
        assert_eq!(
            filter.apply("Human:call me at 555-1234 AI:ok"),
            "Human:call me at [REDACTED] AI:ok"
        );
    }

    #[test]
    fn masks_high_entropy_tokens() {
        let filter = CaptureFilter::new(MemoryCapturePolicy::default()).expect("filter");
        let content = "Human:my key is sk4Fq9Zr2Lm8Xw1Tb7Yc3Nv6 AI:noted";
        assert_eq!(filter.apply(content), "Human:my key is [REDACTED] AI:noted");
        assert_eq!(
            filter.apply("Human:Hello AI:Hi there"),
            "Human:Hello AI:Hi there"
        );
    }

    #[test]
    fn masks_tokens_on_their_own_line() {
        let filter = CaptureFilter::new(MemoryCapturePolicy::default()).expect("filter");
        assert_eq!(
            filter.apply("Human:key?\nsk4Fq9Zr2Lm8Xw1Tb7Yc3Nv6\nAI:noted"),
            "Human:key?\n[REDACTED]\nAI:noted"
        );
        assert_eq!(
            filter.apply("Human:a\tb  c\n\nAI:d"),
            "Human:a\tb  c\n\nAI:d"
        );
    }

    #[test]
    fn keeps_urls_and_hex_digests() {
        let filter = CaptureFilter::new(MemoryCapturePolicy::default()).expect("filter");
        let url = "Human:docs? AI:see https://docs.rs/tokio/1.44.0/tokio/time/fn.interval_at.html";
        assert_eq!(filter.apply(url), url);
        let commit = "Human:which? AI:commit 9fceb02d0ae598e95dc970b74767f19372d61af8";
        assert_eq!(filter.apply(commit), commit);
        let id = "Human:id? AI:it is 3f2b8c1e-9d4a-4e6b-8a7f-2c5d9e1b0a64";
        assert_eq!(filter.apply(id), id);
    }

    #[test]
    fn rejects_invalid_pattern() {
        let err = CaptureFilter::new(MemoryCapturePolicy {
            redact_patterns: vec!["(".to_string()],
            ..MemoryCapturePolicy::default()
        })
        .expect_err("invalid");
        assert_eq!(err.to_string().starts_with("regex error: ("), true);
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        let filter = CaptureFilter::new(MemoryCapturePolicy {
            max_record_chars: Some(5),
            ..MemoryCapturePolicy::default()
        })
        .expect("filter");
        assert_eq!(filter.apply("Human:Hello"), "Human");
    }

    #[test]
    fn entropy_of_repeated_char_is_zero() {
        assert_eq!(shannon_entropy("aaaa"), 0.0);
        assert_eq!(shannon_entropy(""), 0.0);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.001);
    }
}

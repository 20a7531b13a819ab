//! Memory record model stored in the vector index.

use crate::error::MemoryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One unit of long-term memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Text that is embedded and returned verbatim on recall.
    pub content: String,
    /// Additional metadata for recall and filtering.
    pub metadata: serde_json::Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    /// Create a record with a fresh id and the current timestamp.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    /// Attach metadata to the record.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Record plus the embedding it was indexed under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedRecord {
    pub record: MemoryRecord,
    pub embedding: Vec<f32>,
}

/// Record returned from a similarity query with its cosine distance.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub distance: f32,
}

/// Validated key that namespaces a memory store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    /// Parse an identity, rejecting values unsafe as a path component.
    pub fn parse(value: impl Into<String>) -> Result<Self, MemoryError> {
        let value = value.into();
        let valid = !value.is_empty()
            && value != "."
            && value != ".."
            && value
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
        if !valid {
            return Err(MemoryError::InvalidIdentity(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Identity;
    use pretty_assertions::assert_eq;

    #[test]
    fn identity_accepts_numeric_and_slug_values() {
        assert_eq!(Identity::parse("123456").expect("numeric").as_str(), "123456");
        assert_eq!(Identity::parse("user-a_1.b").expect("slug").as_str(), "user-a_1.b");
    }

    #[test]
    fn identity_rejects_path_traversal() {
        for value in ["", ".", "..", "../etc", "a/b", "a b"] {
            let err = Identity::parse(value).expect_err("invalid");
            assert_eq!(err.to_string().starts_with("invalid identity"), true);
        }
    }
}

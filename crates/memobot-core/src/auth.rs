//! Sender allow-listing.

use memobot_protocol::SenderPolicy;
use std::collections::HashSet;

/// Allows an explicit set of sender ids, or everyone.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    senders: HashSet<String>,
    allow_any: bool,
}

impl AllowList {
    pub fn new<I, S>(senders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            senders: senders.into_iter().map(Into::into).collect(),
            allow_any: false,
        }
    }

    /// Policy that accepts every sender.
    pub fn any() -> Self {
        Self {
            senders: HashSet::new(),
            allow_any: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.allow_any && self.senders.is_empty()
    }
}

impl SenderPolicy for AllowList {
    fn is_allowed(&self, sender: &str) -> bool {
        self.allow_any || self.senders.contains(sender)
    }
}

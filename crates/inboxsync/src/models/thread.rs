//! Thread aggregate model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider thread identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A conversation owned by one account.
///
/// Everything except `done` is derived from the member messages during a
/// merge. `done` is user state and survives re-syncs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: ThreadId,
    pub account_id: String,
    pub subject: String,
    /// Latest `sent_at` over all persisted member messages
    pub last_message_date: DateTime<Utc>,
    pub inbox_status: bool,
    pub sent_status: bool,
    pub draft_status: bool,
    pub done: bool,
    pub message_count: usize,
    /// Distinct participant addresses across the thread
    #[serde(default)]
    pub participant_addresses: Vec<String>,
}

impl Thread {
    /// Create an empty thread row, filled in by the merge engine
    pub fn new(id: ThreadId, account_id: impl Into<String>) -> Self {
        Self {
            id,
            account_id: account_id.into(),
            subject: String::new(),
            last_message_date: DateTime::<Utc>::UNIX_EPOCH,
            inbox_status: false,
            sent_status: false,
            draft_status: false,
            done: false,
            message_count: 0,
            participant_addresses: Vec::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_last_message_date(mut self, at: DateTime<Utc>) -> Self {
        self.last_message_date = at;
        self
    }
}

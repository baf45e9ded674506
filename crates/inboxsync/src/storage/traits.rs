//! Storage trait definitions

use crate::models::{Account, EmailAddress, EmailMessage, MessageId, Thread, ThreadId};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Mailbox tab, each backed by one thread status flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Inbox,
    Sent,
    Drafts,
}

impl Tab {
    /// Parse a tab name; unknown names mean "no tab filter"
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "inbox" => Some(Tab::Inbox),
            "sent" => Some(Tab::Sent),
            "drafts" | "draft" => Some(Tab::Drafts),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Inbox => "inbox",
            Tab::Sent => "sent",
            Tab::Drafts => "drafts",
        }
    }

    /// Whether a thread belongs to this tab
    pub fn matches(&self, thread: &Thread) -> bool {
        match self {
            Tab::Inbox => thread.inbox_status,
            Tab::Sent => thread.sent_status,
            Tab::Drafts => thread.draft_status,
        }
    }
}

/// Thread list filter; `None` fields do not constrain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadFilter {
    pub tab: Option<Tab>,
    pub done: Option<bool>,
}

impl ThreadFilter {
    pub fn tab(tab: Option<Tab>) -> Self {
        Self { tab, done: None }
    }

    pub fn with_done(mut self, done: bool) -> Self {
        self.done = Some(done);
        self
    }

    pub fn matches(&self, thread: &Thread) -> bool {
        self.tab.is_none_or(|tab| tab.matches(thread))
            && self.done.is_none_or(|done| thread.done == done)
    }
}

/// Trait for mail storage operations
///
/// Abstracts over storage backends. Every write is an upsert keyed by a
/// natural key and must be atomic per call; the sync core does no locking
/// of its own.
pub trait MailStore: Send + Sync {
    // === Accounts ===

    /// Insert or update an account keyed by token (falling back to id).
    /// Returns the stored row.
    fn upsert_account(&self, account: Account) -> Result<Account>;

    /// Get an account by id
    fn get_account(&self, id: &str) -> Result<Option<Account>>;

    // === Threads ===

    /// Insert or update a thread keyed by (account_id, id)
    fn upsert_thread(&self, thread: Thread) -> Result<()>;

    /// Get a thread owned by an account
    fn get_thread(&self, account_id: &str, id: &ThreadId) -> Result<Option<Thread>>;

    /// List threads ordered by last_message_date descending
    fn list_threads(
        &self,
        account_id: &str,
        filter: &ThreadFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Thread>>;

    /// Count threads matching a filter
    fn count_threads(&self, account_id: &str, filter: &ThreadFilter) -> Result<usize>;

    /// Set the done flag. Returns false if the thread does not exist.
    fn set_thread_done(&self, account_id: &str, id: &ThreadId, done: bool) -> Result<bool>;

    /// Remove a thread row. Returns false if it did not exist.
    fn delete_thread(&self, account_id: &str, id: &ThreadId) -> Result<bool>;

    // === Messages ===

    /// Insert or update a message keyed by (account_id, id), including its
    /// recipients and attachment rows
    fn upsert_message(&self, account_id: &str, message: EmailMessage) -> Result<()>;

    /// Get a message owned by an account
    fn get_message(&self, account_id: &str, id: &MessageId) -> Result<Option<EmailMessage>>;

    /// List messages for a thread, ordered by sent_at ascending
    fn list_messages_for_thread(
        &self,
        account_id: &str,
        thread_id: &ThreadId,
    ) -> Result<Vec<EmailMessage>>;

    /// Check if a message exists
    fn has_message(&self, account_id: &str, id: &MessageId) -> Result<bool>;

    /// Count messages stored for an account
    fn count_messages(&self, account_id: &str) -> Result<usize>;

    // === Email addresses ===

    /// Look up or create the shared address row for `address.address`.
    /// A non-empty name refreshes the stored name.
    fn upsert_email_address(&self, account_id: &str, address: &EmailAddress)
    -> Result<EmailAddress>;

    /// Case-insensitive substring search over stored addresses
    fn search_email_addresses(
        &self,
        account_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EmailAddress>>;

    /// Count address rows for an account
    fn count_email_addresses(&self, account_id: &str) -> Result<usize>;
}

/// Natural key of an attachment within a message
pub(crate) fn attachment_key(id: &str, position: usize) -> String {
    if id.is_empty() {
        format!("#{}", position)
    } else {
        id.to_string()
    }
}

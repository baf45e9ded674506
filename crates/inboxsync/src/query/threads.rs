//! Thread query functions

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{EmailAddress, EmailMessage, MessageId, Thread, ThreadId};
use crate::storage::{MailStore, Tab, ThreadFilter};

/// Maximum number of address suggestions returned
pub const MAX_SUGGESTIONS: usize = 5;

/// A thread with its messages, newest message first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread: Thread,
    pub messages: Vec<EmailMessage>,
}

/// Detailed thread information including all messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadDetail {
    /// The thread metadata
    pub thread: Thread,
    /// All messages in the thread, ordered chronologically, attachments included
    pub messages: Vec<EmailMessage>,
}

/// A thread with only its latest message, as needed to compose a reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyDetails {
    pub thread: Thread,
    pub latest: Option<EmailMessage>,
}

/// List an account's threads in a tab, newest first.
///
/// `tab: None` lists every thread. Messages inside each summary are ordered
/// by `sent_at` descending.
pub fn list_threads(
    store: &dyn MailStore,
    account_id: &str,
    tab: Option<Tab>,
    done: bool,
    limit: usize,
    offset: usize,
) -> Result<Vec<ThreadSummary>> {
    let filter = ThreadFilter::tab(tab).with_done(done);
    let threads = store.list_threads(account_id, &filter, limit, offset)?;

    threads
        .into_iter()
        .map(|thread| -> Result<ThreadSummary> {
            let mut messages = store.list_messages_for_thread(account_id, &thread.id)?;
            messages.reverse();
            Ok(ThreadSummary { thread, messages })
        })
        .collect()
}

/// Count an account's threads in a tab, done or not
pub fn count_threads(store: &dyn MailStore, account_id: &str, tab: Option<Tab>) -> Result<usize> {
    store.count_threads(account_id, &ThreadFilter::tab(tab))
}

/// Get a thread with all of its messages, oldest first
pub fn get_thread_detail(
    store: &dyn MailStore,
    account_id: &str,
    thread_id: &ThreadId,
) -> Result<Option<ThreadDetail>> {
    let Some(thread) = store.get_thread(account_id, thread_id)? else {
        return Ok(None);
    };

    let messages = store.list_messages_for_thread(account_id, thread_id)?;
    Ok(Some(ThreadDetail { thread, messages }))
}

/// Get a thread with only its most recent message
pub fn get_reply_details(
    store: &dyn MailStore,
    account_id: &str,
    thread_id: &ThreadId,
) -> Result<Option<ReplyDetails>> {
    let Some(thread) = store.get_thread(account_id, thread_id)? else {
        return Ok(None);
    };

    let latest = store
        .list_messages_for_thread(account_id, thread_id)?
        .into_iter()
        .last();
    Ok(Some(ReplyDetails { thread, latest }))
}

/// Get one message owned by the account
pub fn get_email_details(
    store: &dyn MailStore,
    account_id: &str,
    message_id: &MessageId,
) -> Result<Option<EmailMessage>> {
    store.get_message(account_id, message_id)
}

/// Mark a thread done or undone. Returns false if the thread does not exist.
pub fn set_done(
    store: &dyn MailStore,
    account_id: &str,
    thread_id: &ThreadId,
    done: bool,
) -> Result<bool> {
    store.set_thread_done(account_id, thread_id, done)
}

/// Known addresses containing `query`, case-insensitively
pub fn email_suggestions(
    store: &dyn MailStore,
    account_id: &str,
    query: &str,
) -> Result<Vec<EmailAddress>> {
    store.search_email_addresses(account_id, query, MAX_SUGGESTIONS)
}

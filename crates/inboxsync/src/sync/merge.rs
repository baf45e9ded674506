//! Idempotent merge of canonical messages into storage
//!
//! Every write is an upsert keyed by a natural key, so re-running a batch
//! leaves storage unchanged. Thread rows are recomputed from all persisted
//! members after the batch, which keeps their aggregates correct no matter
//! which subset of a thread a given sync happened to fetch.

use anyhow::Result;
use log::{debug, warn};
use std::collections::{BTreeSet, HashSet};

use crate::models::{EmailAddress, EmailLabel, EmailMessage, Thread, ThreadId, labels};
use crate::storage::MailStore;

/// Statistics from a merge
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    /// Messages written (new or updated)
    pub messages_stored: usize,
    /// Threads whose aggregates were recomputed
    pub threads_updated: usize,
    /// Address rows touched
    pub addresses_upserted: usize,
    /// Per-message or per-thread failures; the batch continued past each
    pub errors: usize,
}

/// Merge a batch of canonical messages for one account.
///
/// Per-message failures are logged and counted; they never abort the batch.
pub fn merge_messages(
    store: &dyn MailStore,
    account_id: &str,
    messages: Vec<EmailMessage>,
) -> MergeStats {
    let mut stats = MergeStats::default();
    if messages.is_empty() {
        return stats;
    }

    let mut touched: BTreeSet<ThreadId> = BTreeSet::new();

    for message in messages {
        let id = message.id.clone();
        let thread_id = message.thread_id.clone();

        match merge_one(store, account_id, message) {
            Ok(merged) => {
                stats.messages_stored += 1;
                stats.addresses_upserted += merged.addresses;
                touched.insert(thread_id);
                // A message that moved threads leaves its old thread behind
                if let Some(previous) = merged.moved_from {
                    touched.insert(previous);
                }
            }
            Err(e) => {
                warn!("Failed to merge message {}: {:#}", id.as_str(), e);
                stats.errors += 1;
            }
        }
    }

    for thread_id in &touched {
        match refresh_thread(store, account_id, thread_id) {
            Ok(()) => stats.threads_updated += 1,
            Err(e) => {
                warn!("Failed to refresh thread {}: {:#}", thread_id.as_str(), e);
                stats.errors += 1;
            }
        }
    }

    debug!(
        "Merged {} messages into {} threads for {} ({} errors)",
        stats.messages_stored, stats.threads_updated, account_id, stats.errors
    );

    stats
}

struct Merged {
    addresses: usize,
    moved_from: Option<ThreadId>,
}

/// Write one message and its dependents.
///
/// The thread stub is only created once the message row is stored, so a
/// failed write never leaves an empty thread behind.
fn merge_one(store: &dyn MailStore, account_id: &str, mut message: EmailMessage) -> Result<Merged> {
    let moved_from = store
        .get_message(account_id, &message.id)?
        .map(|previous| previous.thread_id)
        .filter(|previous| previous != &message.thread_id);

    message.to = dedup_recipients(message.to);
    message.cc = dedup_recipients(message.cc);
    message.bcc = dedup_recipients(message.bcc);
    message.reply_to = dedup_recipients(message.reply_to);

    let mut addresses = 0;
    let mut seen = HashSet::new();
    for participant in message.participants() {
        let key = participant.key();
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        store.upsert_email_address(account_id, participant)?;
        addresses += 1;
    }

    let thread_id = message.thread_id.clone();
    let stub = Thread::new(thread_id.clone(), account_id)
        .with_subject(message.subject.clone())
        .with_last_message_date(message.sent_at);

    store.upsert_message(account_id, message)?;

    if store.get_thread(account_id, &thread_id)?.is_none() {
        store.upsert_thread(stub)?;
    }

    Ok(Merged {
        addresses,
        moved_from,
    })
}

/// Keep the first occurrence of each address within one recipient list
fn dedup_recipients(list: Vec<EmailAddress>) -> Vec<EmailAddress> {
    let mut seen = HashSet::new();
    list.into_iter()
        .filter(|a| a.key().is_empty() || seen.insert(a.key()))
        .collect()
}

/// Recompute a thread's derived fields from all persisted members.
/// A thread left without members is removed.
fn refresh_thread(store: &dyn MailStore, account_id: &str, thread_id: &ThreadId) -> Result<()> {
    let members = store.list_messages_for_thread(account_id, thread_id)?;
    if members.is_empty() {
        debug!("Thread {} has no members left, removing", thread_id.as_str());
        store.delete_thread(account_id, thread_id)?;
        return Ok(());
    }

    let existing = store.get_thread(account_id, thread_id)?;

    let mut thread = compute_thread(thread_id, account_id, &members);
    thread.done = existing.map(|t| t.done).unwrap_or(false);

    store.upsert_thread(thread)
}

/// Derive thread aggregates from its members (sorted by sent_at ascending)
pub fn compute_thread(thread_id: &ThreadId, account_id: &str, members: &[EmailMessage]) -> Thread {
    let mut thread = Thread::new(thread_id.clone(), account_id);

    if let Some(first) = members.iter().min_by_key(|m| m.sent_at) {
        thread.subject = first.subject.clone();
    }
    if let Some(last) = members.iter().map(|m| m.sent_at).max() {
        thread.last_message_date = last;
    }

    for m in members {
        let has_system_label = labels::is_inbox(&m.sys_labels)
            || labels::is_sent(&m.sys_labels)
            || labels::is_draft(&m.sys_labels);

        if has_system_label {
            thread.inbox_status |= labels::is_inbox(&m.sys_labels);
            thread.sent_status |= labels::is_sent(&m.sys_labels);
            thread.draft_status |= labels::is_draft(&m.sys_labels);
        } else {
            match m.email_label {
                EmailLabel::Inbox => thread.inbox_status = true,
                EmailLabel::Sent => thread.sent_status = true,
                EmailLabel::Draft => thread.draft_status = true,
            }
        }
    }

    let mut seen = HashSet::new();
    thread.participant_addresses = members
        .iter()
        .flat_map(|m| m.participants())
        .map(|a| a.key())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect();

    thread.message_count = members.len();
    thread
}

//! In-memory storage implementation
//!
//! Used by tests and by embedders that do not need persistence.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::{MailStore, ThreadFilter, attachment_key};
use crate::models::{Account, EmailAddress, EmailMessage, MessageId, Thread, ThreadId};

/// (account_id, entity id)
type Key = (String, String);

fn key(account_id: &str, id: &str) -> Key {
    (account_id.to_string(), id.to_string())
}

/// In-memory implementation of MailStore
///
/// Uses HashMaps protected by RwLocks for thread-safe access.
pub struct InMemoryMailStore {
    accounts: RwLock<HashMap<String, Account>>,
    threads: RwLock<HashMap<Key, Thread>>,
    messages: RwLock<HashMap<Key, EmailMessage>>,
    /// (account_id, address key) -> shared address row
    addresses: RwLock<HashMap<Key, EmailAddress>>,
}

impl InMemoryMailStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            threads: RwLock::new(HashMap::new()),
            messages: RwLock::new(HashMap::new()),
            addresses: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryMailStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MailStore for InMemoryMailStore {
    fn upsert_account(&self, account: Account) -> Result<Account> {
        let mut accounts = self.accounts.write().unwrap();

        let existing_id = accounts
            .values()
            .find(|a| a.token == account.token)
            .or_else(|| accounts.get(&account.id))
            .map(|a| a.id.clone());

        let stored = match existing_id.and_then(|id| accounts.get_mut(&id)) {
            Some(existing) => {
                existing.token = account.token;
                existing.email_address = account.email_address;
                existing.name = account.name;
                existing.clone()
            }
            None => {
                accounts.insert(account.id.clone(), account.clone());
                account
            }
        };

        Ok(stored)
    }

    fn get_account(&self, id: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.read().unwrap();
        Ok(accounts.get(id).cloned())
    }

    fn upsert_thread(&self, thread: Thread) -> Result<()> {
        let mut threads = self.threads.write().unwrap();
        threads.insert(key(&thread.account_id, thread.id.as_str()), thread);
        Ok(())
    }

    fn get_thread(&self, account_id: &str, id: &ThreadId) -> Result<Option<Thread>> {
        let threads = self.threads.read().unwrap();
        Ok(threads.get(&key(account_id, id.as_str())).cloned())
    }

    fn list_threads(
        &self,
        account_id: &str,
        filter: &ThreadFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Thread>> {
        let threads = self.threads.read().unwrap();
        let mut matching: Vec<Thread> = threads
            .values()
            .filter(|t| t.account_id == account_id && filter.matches(t))
            .cloned()
            .collect();

        // Newest first, id as a stable tiebreak
        matching.sort_by(|a, b| {
            b.last_message_date
                .cmp(&a.last_message_date)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    fn count_threads(&self, account_id: &str, filter: &ThreadFilter) -> Result<usize> {
        let threads = self.threads.read().unwrap();
        Ok(threads
            .values()
            .filter(|t| t.account_id == account_id && filter.matches(t))
            .count())
    }

    fn set_thread_done(&self, account_id: &str, id: &ThreadId, done: bool) -> Result<bool> {
        let mut threads = self.threads.write().unwrap();
        match threads.get_mut(&key(account_id, id.as_str())) {
            Some(thread) => {
                thread.done = done;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_thread(&self, account_id: &str, id: &ThreadId) -> Result<bool> {
        let mut threads = self.threads.write().unwrap();
        Ok(threads.remove(&key(account_id, id.as_str())).is_some())
    }

    fn upsert_message(&self, account_id: &str, mut message: EmailMessage) -> Result<()> {
        // Collapse attachments sharing a natural key, last one wins
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut attachments = Vec::with_capacity(message.attachments.len());
        for (position, attachment) in message.attachments.into_iter().enumerate() {
            let k = attachment_key(&attachment.id, position);
            match seen.get(&k) {
                Some(&idx) => attachments[idx] = attachment,
                None => {
                    seen.insert(k, attachments.len());
                    attachments.push(attachment);
                }
            }
        }
        message.attachments = attachments;

        let mut messages = self.messages.write().unwrap();
        messages.insert(key(account_id, message.id.as_str()), message);
        Ok(())
    }

    fn get_message(&self, account_id: &str, id: &MessageId) -> Result<Option<EmailMessage>> {
        let messages = self.messages.read().unwrap();
        Ok(messages.get(&key(account_id, id.as_str())).cloned())
    }

    fn list_messages_for_thread(
        &self,
        account_id: &str,
        thread_id: &ThreadId,
    ) -> Result<Vec<EmailMessage>> {
        let messages = self.messages.read().unwrap();
        let mut result: Vec<EmailMessage> = messages
            .iter()
            .filter(|((acc, _), m)| acc == account_id && &m.thread_id == thread_id)
            .map(|(_, m)| m.clone())
            .collect();

        result.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then_with(|| a.id.cmp(&b.id)));
        Ok(result)
    }

    fn has_message(&self, account_id: &str, id: &MessageId) -> Result<bool> {
        let messages = self.messages.read().unwrap();
        Ok(messages.contains_key(&key(account_id, id.as_str())))
    }

    fn count_messages(&self, account_id: &str) -> Result<usize> {
        let messages = self.messages.read().unwrap();
        Ok(messages.keys().filter(|(acc, _)| acc == account_id).count())
    }

    fn upsert_email_address(
        &self,
        account_id: &str,
        address: &EmailAddress,
    ) -> Result<EmailAddress> {
        let mut addresses = self.addresses.write().unwrap();
        let entry = addresses
            .entry(key(account_id, &address.key()))
            .or_insert_with(|| EmailAddress::with_name("", address.address.trim()));

        if !address.name.is_empty() {
            entry.name = address.name.clone();
        }

        Ok(entry.clone())
    }

    fn search_email_addresses(
        &self,
        account_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EmailAddress>> {
        let needle = query.to_ascii_lowercase();
        let addresses = self.addresses.read().unwrap();
        let mut matches: Vec<EmailAddress> = addresses
            .iter()
            .filter(|((acc, k), _)| acc == account_id && k.contains(&needle))
            .map(|(_, a)| a.clone())
            .collect();

        matches.sort_by(|a, b| a.address.cmp(&b.address));
        matches.truncate(limit);
        Ok(matches)
    }

    fn count_email_addresses(&self, account_id: &str) -> Result<usize> {
        let addresses = self.addresses.read().unwrap();
        Ok(addresses.keys().filter(|(acc, _)| acc == account_id).count())
    }
}

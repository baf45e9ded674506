//! SQLite-based mail storage with zstd-compressed message bodies

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{MailStore, Tab, ThreadFilter, attachment_key};
use crate::models::{
    Account, Attachment, EmailAddress, EmailLabel, EmailMessage, MessageId, Sensitivity, Thread,
    ThreadId,
};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE accounts (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                token TEXT NOT NULL UNIQUE,
                provider TEXT NOT NULL,
                email_address TEXT NOT NULL,
                name TEXT NOT NULL
            );

            CREATE TABLE threads (
                account_id TEXT NOT NULL,
                id TEXT NOT NULL,
                subject TEXT NOT NULL,
                last_message_date INTEGER NOT NULL,  -- epoch millis
                inbox_status INTEGER NOT NULL DEFAULT 0,
                sent_status INTEGER NOT NULL DEFAULT 0,
                draft_status INTEGER NOT NULL DEFAULT 0,
                done INTEGER NOT NULL DEFAULT 0,
                message_count INTEGER NOT NULL DEFAULT 0,
                participant_addresses TEXT NOT NULL DEFAULT '[]',  -- JSON array
                PRIMARY KEY (account_id, id)
            );

            CREATE INDEX idx_threads_last_message_date
                ON threads(account_id, last_message_date DESC);

            CREATE TABLE messages (
                account_id TEXT NOT NULL,
                id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                internet_message_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                body BLOB NOT NULL,  -- zstd compressed
                body_snippet TEXT NOT NULL,
                sent_at INTEGER NOT NULL,
                received_at INTEGER NOT NULL,
                from_name TEXT NOT NULL,
                from_address TEXT NOT NULL,
                in_reply_to TEXT,
                message_references TEXT,
                has_attachments INTEGER NOT NULL DEFAULT 0,
                sys_labels TEXT NOT NULL DEFAULT '[]',  -- JSON array
                email_label TEXT NOT NULL,
                sensitivity TEXT NOT NULL,
                unread INTEGER NOT NULL DEFAULT 0,
                starred INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (account_id, id)
            );

            CREATE INDEX idx_messages_thread ON messages(account_id, thread_id, sent_at ASC);

            -- Per-message recipient links; names live here, shared rows in email_addresses
            CREATE TABLE message_recipients (
                account_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                recipient_type TEXT NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                address TEXT NOT NULL,
                PRIMARY KEY (account_id, message_id, recipient_type, position)
            );

            CREATE TABLE email_addresses (
                account_id TEXT NOT NULL,
                address_key TEXT NOT NULL,
                address TEXT NOT NULL,
                name TEXT NOT NULL,
                PRIMARY KEY (account_id, address_key)
            );

            CREATE TABLE attachments (
                account_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                attachment_key TEXT NOT NULL,
                position INTEGER NOT NULL,
                id TEXT NOT NULL,
                name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                inline INTEGER NOT NULL DEFAULT 0,
                content_id TEXT,
                PRIMARY KEY (account_id, message_id, attachment_key)
            );
            "#,
        ),
    ])
}

const RECIPIENT_KINDS: [&str; 4] = ["to", "cc", "bcc", "reply_to"];

const THREAD_COLUMNS: &str = "account_id, id, subject, last_message_date, inbox_status,
     sent_status, draft_status, done, message_count, participant_addresses";

/// SQLite-based mail storage
pub struct SqliteMailStore {
    conn: Mutex<Connection>,
}

impl SqliteMailStore {
    /// Open (or create) a database file and bring its schema up to date
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL keeps readers unblocked while a sync batch writes
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn load_recipients(
        conn: &Connection,
        account_id: &str,
        message_id: &str,
        recipient_type: &str,
    ) -> Result<Vec<EmailAddress>> {
        let mut stmt = conn.prepare(
            "SELECT name, address FROM message_recipients
             WHERE account_id = ? AND message_id = ? AND recipient_type = ?
             ORDER BY position",
        )?;

        let recipients = stmt
            .query_map(params![account_id, message_id, recipient_type], |row| {
                Ok(EmailAddress {
                    name: row.get(0)?,
                    address: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(recipients)
    }

    fn save_recipients(
        conn: &Connection,
        account_id: &str,
        message_id: &str,
        recipient_type: &str,
        recipients: &[EmailAddress],
    ) -> Result<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO message_recipients
             (account_id, message_id, recipient_type, position, name, address)
             VALUES (?, ?, ?, ?, ?, ?)",
        )?;

        for (i, addr) in recipients.iter().enumerate() {
            stmt.execute(params![
                account_id,
                message_id,
                recipient_type,
                i as i64,
                addr.name,
                addr.address
            ])?;
        }

        Ok(())
    }

    fn load_attachments(
        conn: &Connection,
        account_id: &str,
        message_id: &str,
    ) -> Result<Vec<Attachment>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, mime_type, size, inline, content_id FROM attachments
             WHERE account_id = ? AND message_id = ?
             ORDER BY position",
        )?;

        let attachments = stmt
            .query_map(params![account_id, message_id], |row| {
                Ok(Attachment {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    mime_type: row.get(2)?,
                    size: row.get::<_, i64>(3)? as u64,
                    inline: row.get(4)?,
                    content_id: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(attachments)
    }

    /// Upsert attachment rows by natural key and drop rows the message no longer has
    fn save_attachments(
        conn: &Connection,
        account_id: &str,
        message_id: &str,
        attachments: &[Attachment],
    ) -> Result<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO attachments
             (account_id, message_id, attachment_key, position, id, name, mime_type, size, inline, content_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(account_id, message_id, attachment_key) DO UPDATE SET
                position = excluded.position,
                id = excluded.id,
                name = excluded.name,
                mime_type = excluded.mime_type,
                size = excluded.size,
                inline = excluded.inline,
                content_id = excluded.content_id",
        )?;

        let mut keys = Vec::with_capacity(attachments.len());
        for (position, a) in attachments.iter().enumerate() {
            let key = attachment_key(&a.id, position);
            stmt.execute(params![
                account_id,
                message_id,
                key,
                position as i64,
                a.id,
                a.name,
                a.mime_type,
                a.size as i64,
                a.inline,
                a.content_id,
            ])?;
            keys.push(key);
        }

        let existing: Vec<String> = conn
            .prepare("SELECT attachment_key FROM attachments WHERE account_id = ? AND message_id = ?")?
            .query_map(params![account_id, message_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        for stale in existing.iter().filter(|k| !keys.contains(k)) {
            conn.execute(
                "DELETE FROM attachments WHERE account_id = ? AND message_id = ? AND attachment_key = ?",
                params![account_id, message_id, stale],
            )?;
        }

        Ok(())
    }

    fn load_message(
        conn: &Connection,
        account_id: &str,
        message_id: &str,
    ) -> Result<Option<EmailMessage>> {
        let row = conn
            .query_row(
                "SELECT id, thread_id, internet_message_id, subject, body, body_snippet,
                        sent_at, received_at, from_name, from_address, in_reply_to,
                        message_references, has_attachments, sys_labels, email_label,
                        sensitivity, unread, starred
                 FROM messages WHERE account_id = ? AND id = ?",
                params![account_id, message_id],
                MessageRow::from_row,
            )
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut recipients = Vec::with_capacity(RECIPIENT_KINDS.len());
        for kind in RECIPIENT_KINDS {
            recipients.push(Self::load_recipients(conn, account_id, message_id, kind)?);
        }
        let attachments = Self::load_attachments(conn, account_id, message_id)?;

        row.into_message(recipients, attachments).map(Some)
    }
}

/// Column values of one `messages` row before recipients are attached
struct MessageRow {
    id: String,
    thread_id: String,
    internet_message_id: String,
    subject: String,
    body: Vec<u8>,
    body_snippet: String,
    sent_at: i64,
    received_at: i64,
    from_name: String,
    from_address: String,
    in_reply_to: Option<String>,
    references: Option<String>,
    has_attachments: bool,
    sys_labels: String,
    email_label: String,
    sensitivity: String,
    unread: bool,
    starred: bool,
}

impl MessageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            thread_id: row.get(1)?,
            internet_message_id: row.get(2)?,
            subject: row.get(3)?,
            body: row.get(4)?,
            body_snippet: row.get(5)?,
            sent_at: row.get(6)?,
            received_at: row.get(7)?,
            from_name: row.get(8)?,
            from_address: row.get(9)?,
            in_reply_to: row.get(10)?,
            references: row.get(11)?,
            has_attachments: row.get(12)?,
            sys_labels: row.get(13)?,
            email_label: row.get(14)?,
            sensitivity: row.get(15)?,
            unread: row.get(16)?,
            starred: row.get(17)?,
        })
    }

    fn into_message(
        self,
        recipients: Vec<Vec<EmailAddress>>,
        attachments: Vec<Attachment>,
    ) -> Result<EmailMessage> {
        let body = zstd::decode_all(self.body.as_slice())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .with_context(|| format!("Failed to decompress body of {}", self.id))?;
        let sys_labels: Vec<String> = serde_json::from_str(&self.sys_labels)
            .with_context(|| format!("Corrupt sys_labels on {}", self.id))?;

        let mut recipients = recipients.into_iter();
        let mut next = || recipients.next().unwrap_or_default();

        Ok(EmailMessage {
            id: MessageId::new(self.id),
            thread_id: ThreadId::new(self.thread_id),
            internet_message_id: self.internet_message_id,
            subject: self.subject,
            body,
            body_snippet: self.body_snippet,
            sent_at: from_millis(self.sent_at),
            received_at: from_millis(self.received_at),
            from: EmailAddress {
                name: self.from_name,
                address: self.from_address,
            },
            to: next(),
            cc: next(),
            bcc: next(),
            reply_to: next(),
            in_reply_to: self.in_reply_to,
            references: self.references,
            has_attachments: self.has_attachments,
            attachments,
            sys_labels,
            email_label: EmailLabel::parse(&self.email_label),
            sensitivity: Sensitivity::parse(&self.sensitivity),
            unread: self.unread,
            starred: self.starred,
        })
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<Thread> {
    let participants: String = row.get(9)?;
    Ok(Thread {
        account_id: row.get(0)?,
        id: ThreadId::new(row.get::<_, String>(1)?),
        subject: row.get(2)?,
        last_message_date: from_millis(row.get(3)?),
        inbox_status: row.get(4)?,
        sent_status: row.get(5)?,
        draft_status: row.get(6)?,
        done: row.get(7)?,
        message_count: row.get::<_, i64>(8)? as usize,
        participant_addresses: serde_json::from_str(&participants).unwrap_or_default(),
    })
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        token: row.get(2)?,
        provider: row.get(3)?,
        email_address: row.get(4)?,
        name: row.get(5)?,
    })
}

/// WHERE fragment for a thread filter; parameters are bound positionally
/// after `account_id`
fn filter_clause(filter: &ThreadFilter) -> (String, Vec<bool>) {
    let mut clause = String::from("account_id = ?1");
    let mut values = Vec::new();

    if let Some(tab) = filter.tab {
        let column = match tab {
            Tab::Inbox => "inbox_status",
            Tab::Sent => "sent_status",
            Tab::Drafts => "draft_status",
        };
        clause.push_str(&format!(" AND {} = 1", column));
    }
    if let Some(done) = filter.done {
        values.push(done);
        clause.push_str(&format!(" AND done = ?{}", values.len() + 1));
    }

    (clause, values)
}

impl MailStore for SqliteMailStore {
    fn upsert_account(&self, account: Account) -> Result<Account> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let by_token: Option<String> = tx
            .query_row(
                "SELECT id FROM accounts WHERE token = ?",
                [&account.token],
                |row| row.get(0),
            )
            .optional()?;
        let existing = match by_token {
            Some(id) => Some(id),
            None => tx
                .query_row("SELECT id FROM accounts WHERE id = ?", [&account.id], |row| {
                    row.get(0)
                })
                .optional()?,
        };

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE accounts SET token = ?, email_address = ?, name = ? WHERE id = ?",
                    params![account.token, account.email_address, account.name, id],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO accounts (id, user_id, token, provider, email_address, name)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    params![
                        account.id,
                        account.user_id,
                        account.token,
                        account.provider,
                        account.email_address,
                        account.name
                    ],
                )?;
                account.id.clone()
            }
        };

        let stored = tx.query_row(
            "SELECT id, user_id, token, provider, email_address, name FROM accounts WHERE id = ?",
            [&id],
            account_from_row,
        )?;

        tx.commit()?;
        Ok(stored)
    }

    fn get_account(&self, id: &str) -> Result<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        let account = conn
            .query_row(
                "SELECT id, user_id, token, provider, email_address, name FROM accounts WHERE id = ?",
                [id],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    fn upsert_thread(&self, thread: Thread) -> Result<()> {
        let participants = serde_json::to_string(&thread.participant_addresses)?;
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO threads
             (account_id, id, subject, last_message_date, inbox_status, sent_status,
              draft_status, done, message_count, participant_addresses)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(account_id, id) DO UPDATE SET
                subject = excluded.subject,
                last_message_date = excluded.last_message_date,
                inbox_status = excluded.inbox_status,
                sent_status = excluded.sent_status,
                draft_status = excluded.draft_status,
                done = excluded.done,
                message_count = excluded.message_count,
                participant_addresses = excluded.participant_addresses",
            params![
                thread.account_id,
                thread.id.as_str(),
                thread.subject,
                thread.last_message_date.timestamp_millis(),
                thread.inbox_status,
                thread.sent_status,
                thread.draft_status,
                thread.done,
                thread.message_count as i64,
                participants,
            ],
        )?;

        Ok(())
    }

    fn get_thread(&self, account_id: &str, id: &ThreadId) -> Result<Option<Thread>> {
        let conn = self.conn.lock().unwrap();
        let thread = conn
            .query_row(
                &format!(
                    "SELECT {} FROM threads WHERE account_id = ? AND id = ?",
                    THREAD_COLUMNS
                ),
                params![account_id, id.as_str()],
                thread_from_row,
            )
            .optional()?;
        Ok(thread)
    }

    fn list_threads(
        &self,
        account_id: &str,
        filter: &ThreadFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Thread>> {
        let (clause, values) = filter_clause(filter);
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM threads WHERE {}
             ORDER BY last_message_date DESC, id ASC
             LIMIT {} OFFSET {}",
            THREAD_COLUMNS, clause, limit as i64, offset as i64
        ))?;

        let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&account_id];
        for v in &values {
            bound.push(v);
        }

        let threads = stmt
            .query_map(bound.as_slice(), thread_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(threads)
    }

    fn count_threads(&self, account_id: &str, filter: &ThreadFilter) -> Result<usize> {
        let (clause, values) = filter_clause(filter);
        let conn = self.conn.lock().unwrap();

        let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&account_id];
        for v in &values {
            bound.push(v);
        }

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM threads WHERE {}", clause),
            bound.as_slice(),
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn set_thread_done(&self, account_id: &str, id: &ThreadId, done: bool) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE threads SET done = ? WHERE account_id = ? AND id = ?",
            params![done, account_id, id.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn delete_thread(&self, account_id: &str, id: &ThreadId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM threads WHERE account_id = ? AND id = ?",
            params![account_id, id.as_str()],
        )?;
        Ok(removed > 0)
    }

    fn upsert_message(&self, account_id: &str, message: EmailMessage) -> Result<()> {
        // Level 3 is zstd's default speed/ratio tradeoff
        let body = zstd::encode_all(message.body.as_bytes(), 3).context("Failed to compress body")?;
        let sys_labels = serde_json::to_string(&message.sys_labels)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO messages
             (account_id, id, thread_id, internet_message_id, subject, body, body_snippet,
              sent_at, received_at, from_name, from_address, in_reply_to, message_references,
              has_attachments, sys_labels, email_label, sensitivity, unread, starred)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(account_id, id) DO UPDATE SET
                thread_id = excluded.thread_id,
                internet_message_id = excluded.internet_message_id,
                subject = excluded.subject,
                body = excluded.body,
                body_snippet = excluded.body_snippet,
                sent_at = excluded.sent_at,
                received_at = excluded.received_at,
                from_name = excluded.from_name,
                from_address = excluded.from_address,
                in_reply_to = excluded.in_reply_to,
                message_references = excluded.message_references,
                has_attachments = excluded.has_attachments,
                sys_labels = excluded.sys_labels,
                email_label = excluded.email_label,
                sensitivity = excluded.sensitivity,
                unread = excluded.unread,
                starred = excluded.starred",
            params![
                account_id,
                message.id.as_str(),
                message.thread_id.as_str(),
                message.internet_message_id,
                message.subject,
                body,
                message.body_snippet,
                message.sent_at.timestamp_millis(),
                message.received_at.timestamp_millis(),
                message.from.name,
                message.from.address,
                message.in_reply_to,
                message.references,
                message.has_attachments,
                sys_labels,
                message.email_label.as_str(),
                message.sensitivity.as_str(),
                message.unread,
                message.starred,
            ],
        )?;

        tx.execute(
            "DELETE FROM message_recipients WHERE account_id = ? AND message_id = ?",
            params![account_id, message.id.as_str()],
        )?;
        let lists = [&message.to, &message.cc, &message.bcc, &message.reply_to];
        for (kind, list) in RECIPIENT_KINDS.iter().zip(lists) {
            Self::save_recipients(&tx, account_id, message.id.as_str(), kind, list)?;
        }

        Self::save_attachments(&tx, account_id, message.id.as_str(), &message.attachments)?;

        tx.commit()?;
        Ok(())
    }

    fn get_message(&self, account_id: &str, id: &MessageId) -> Result<Option<EmailMessage>> {
        let conn = self.conn.lock().unwrap();
        Self::load_message(&conn, account_id, id.as_str())
    }

    fn list_messages_for_thread(
        &self,
        account_id: &str,
        thread_id: &ThreadId,
    ) -> Result<Vec<EmailMessage>> {
        let conn = self.conn.lock().unwrap();

        let ids: Vec<String> = conn
            .prepare(
                "SELECT id FROM messages WHERE account_id = ? AND thread_id = ?
                 ORDER BY sent_at ASC, id ASC",
            )?
            .query_map(params![account_id, thread_id.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut messages = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(message) = Self::load_message(&conn, account_id, &id)? {
                messages.push(message);
            }
        }

        Ok(messages)
    }

    fn has_message(&self, account_id: &str, id: &MessageId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM messages WHERE account_id = ? AND id = ?)",
            params![account_id, id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn count_messages(&self, account_id: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE account_id = ?",
            [account_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn upsert_email_address(
        &self,
        account_id: &str,
        address: &EmailAddress,
    ) -> Result<EmailAddress> {
        let key = address.key();
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO email_addresses (account_id, address_key, address, name)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(account_id, address_key) DO UPDATE SET
                name = CASE WHEN excluded.name = '' THEN name ELSE excluded.name END",
            params![account_id, key, address.address.trim(), address.name],
        )?;

        let stored = conn.query_row(
            "SELECT name, address FROM email_addresses WHERE account_id = ? AND address_key = ?",
            params![account_id, key],
            |row| {
                Ok(EmailAddress {
                    name: row.get(0)?,
                    address: row.get(1)?,
                })
            },
        )?;
        Ok(stored)
    }

    fn search_email_addresses(
        &self,
        account_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<EmailAddress>> {
        let conn = self.conn.lock().unwrap();

        // instr() avoids LIKE wildcard escaping
        let mut stmt = conn.prepare(
            "SELECT name, address FROM email_addresses
             WHERE account_id = ? AND instr(address_key, ?) > 0
             ORDER BY address ASC
             LIMIT ?",
        )?;

        let matches = stmt
            .query_map(params![account_id, query.to_ascii_lowercase(), limit as i64], |row| {
                Ok(EmailAddress {
                    name: row.get(0)?,
                    address: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(matches)
    }

    fn count_email_addresses(&self, account_id: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM email_addresses WHERE account_id = ?",
            [account_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteMailStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("mail.test.sqlite");
        let store = SqliteMailStore::open(&db_path).unwrap();
        (store, dir)
    }

    fn make_test_message(id: &str, thread_id: &str, day: u32) -> EmailMessage {
        EmailMessage::builder(MessageId::new(id), ThreadId::new(thread_id))
            .date(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap())
            .from(EmailAddress::with_name("Alice", "alice@example.com"))
            .to(vec![EmailAddress::new("bob@example.com")])
            .cc(vec![EmailAddress::with_name("Carol", "carol@example.com")])
            .subject("Test")
            .body("<p>Hello there</p>")
            .sys_labels(vec!["INBOX".to_string(), "UNREAD".to_string()])
            .build()
    }

    fn make_test_thread(id: &str, day: u32) -> Thread {
        let mut t = Thread::new(ThreadId::new(id), "acc")
            .with_subject(format!("Thread {}", id))
            .with_last_message_date(Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap());
        t.inbox_status = true;
        t
    }

    #[test]
    fn test_message_roundtrip() {
        let (store, _dir) = create_test_store();
        let mut message = make_test_message("m1", "t1", 1);
        message.attachments = vec![Attachment {
            id: "a1".to_string(),
            name: "notes.txt".to_string(),
            mime_type: "text/plain".to_string(),
            size: 12,
            inline: false,
            content_id: None,
        }];
        message.has_attachments = true;
        message.in_reply_to = Some("<parent@example.com>".to_string());

        store.upsert_message("acc", message.clone()).unwrap();

        let stored = store.get_message("acc", &MessageId::new("m1")).unwrap().unwrap();
        assert_eq!(stored, message);
        assert!(store.get_message("other", &MessageId::new("m1")).unwrap().is_none());
    }

    #[test]
    fn test_message_upsert_replaces_rows() {
        let (store, _dir) = create_test_store();
        let mut message = make_test_message("m1", "t1", 1);
        message.attachments = vec![
            Attachment {
                id: "a1".to_string(),
                ..Default::default()
            },
            Attachment {
                id: "a2".to_string(),
                ..Default::default()
            },
        ];
        store.upsert_message("acc", message.clone()).unwrap();

        message.to = vec![];
        message.attachments.truncate(1);
        message.unread = true;
        store.upsert_message("acc", message).unwrap();

        let stored = store.get_message("acc", &MessageId::new("m1")).unwrap().unwrap();
        assert!(stored.to.is_empty());
        assert_eq!(stored.attachments.len(), 1);
        assert!(stored.unread);
        assert_eq!(store.count_messages("acc").unwrap(), 1);
    }

    #[test]
    fn test_list_threads_filters_and_orders() {
        let (store, _dir) = create_test_store();
        for (id, day) in [("t1", 1), ("t2", 3), ("t3", 2)] {
            store.upsert_thread(make_test_thread(id, day)).unwrap();
        }
        let mut sent = make_test_thread("t4", 4);
        sent.inbox_status = false;
        sent.sent_status = true;
        store.upsert_thread(sent).unwrap();
        store.set_thread_done("acc", &ThreadId::new("t3"), true).unwrap();

        let inbox = ThreadFilter::tab(Some(Tab::Inbox)).with_done(false);
        let threads = store.list_threads("acc", &inbox, 10, 0).unwrap();
        let ids: Vec<_> = threads.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t1"]);
        assert_eq!(store.count_threads("acc", &inbox).unwrap(), 2);

        let all = store.list_threads("acc", &ThreadFilter::default(), 2, 1).unwrap();
        let ids: Vec<_> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t3"]);
    }

    #[test]
    fn test_thread_upsert_keeps_participants() {
        let (store, _dir) = create_test_store();
        let mut thread = make_test_thread("t1", 1);
        thread.participant_addresses = vec!["a@example.com".to_string()];
        store.upsert_thread(thread.clone()).unwrap();

        let stored = store.get_thread("acc", &ThreadId::new("t1")).unwrap().unwrap();
        assert_eq!(stored, thread);
    }

    #[test]
    fn test_list_messages_for_thread_ordered() {
        let (store, _dir) = create_test_store();
        store.upsert_message("acc", make_test_message("m2", "t1", 5)).unwrap();
        store.upsert_message("acc", make_test_message("m1", "t1", 2)).unwrap();
        store.upsert_message("acc", make_test_message("m3", "t2", 1)).unwrap();

        let msgs = store
            .list_messages_for_thread("acc", &ThreadId::new("t1"))
            .unwrap();
        let ids: Vec<_> = msgs.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
    }

    #[test]
    fn test_email_addresses_shared_and_searchable() {
        let (store, _dir) = create_test_store();
        store
            .upsert_email_address("acc", &EmailAddress::new("Jane@Example.com"))
            .unwrap();
        store
            .upsert_email_address("acc", &EmailAddress::with_name("Jane", "jane@example.com"))
            .unwrap();
        let kept = store
            .upsert_email_address("acc", &EmailAddress::new("jane@example.com"))
            .unwrap();
        store
            .upsert_email_address("acc", &EmailAddress::new("bob%x@example.com"))
            .unwrap();

        assert_eq!(kept.name, "Jane");
        assert_eq!(store.count_email_addresses("acc").unwrap(), 2);

        let hits = store.search_email_addresses("acc", "JANE", 5).unwrap();
        assert_eq!(hits.len(), 1);
        let hits = store.search_email_addresses("acc", "%", 5).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_account_upsert_by_token_then_id() {
        let (store, _dir) = create_test_store();
        store
            .upsert_account(Account::new("g1", "tok-1").with_user("u1"))
            .unwrap();

        // Same token under a different id updates the original row
        let stored = store
            .upsert_account(Account::new("g2", "tok-1").with_email("me@example.com"))
            .unwrap();
        assert_eq!(stored.id, "g1");
        assert_eq!(stored.user_id, "u1");
        assert_eq!(stored.email_address, "me@example.com");

        // Re-authorization with a fresh token keeps the id
        let stored = store.upsert_account(Account::new("g1", "tok-2")).unwrap();
        assert_eq!(stored.token, "tok-2");
        assert!(store.get_account("g2").unwrap().is_none());
    }

    #[test]
    fn test_reopen_preserves_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mail.test.sqlite");
        {
            let store = SqliteMailStore::open(&path).unwrap();
            store.upsert_message("acc", make_test_message("m1", "t1", 1)).unwrap();
        }
        let store = SqliteMailStore::open(&path).unwrap();
        assert!(store.has_message("acc", &MessageId::new("m1")).unwrap());
    }
}

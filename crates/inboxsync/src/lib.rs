//! inboxsync - Email synchronization and normalization core
//!
//! This crate provides:
//! - Canonical domain models (EmailMessage, Thread, EmailAddress, Account)
//! - A provider client for grant-based mail APIs, with response normalization
//! - Fetch strategy resolution across divergent list queries
//! - An idempotent merge of canonical messages into storage
//! - Storage trait abstractions with in-memory and SQLite backends
//! - A query API for thread lists, details and address suggestions
//! - Reply composition and two-phase (draft, then send) delivery
//!
//! All provider and storage calls are synchronous; embedders choose their
//! own threading.

pub mod accounts;
pub mod config;
pub mod models;
pub mod provider;
pub mod query;
pub mod send;
pub mod storage;
pub mod sync;

pub use accounts::{AccountError, AuthorizedGrant, authorize_account, register_account};
pub use config::{ProviderConfig, SyncOptions};
pub use models::{
    Account, Attachment, EmailAddress, EmailLabel, EmailMessage, MessageId, Sensitivity, Thread,
    ThreadId,
};
pub use provider::{
    Credential, ListQuery, MailProvider, MappingError, NylasClient, ProviderError,
    normalize_message, normalize_messages,
};
pub use query::{ReplyDetails, ThreadDetail, ThreadSummary};
pub use send::{OutgoingEmail, SendError, build_reply, reply_to_thread, send_email};
pub use storage::{InMemoryMailStore, MailStore, SqliteMailStore, Tab, ThreadFilter};
pub use sync::{
    FetchAttempt, MergeStats, Readiness, Resolution, StrategyId, SyncError, SyncReport,
    merge_messages, resolve_messages, resolve_threads, sync_account, wait_for_readiness,
};

//! Remote mail provider integration
//!
//! This module provides:
//! - The [`MailProvider`] trait the sync and send paths talk to
//! - [`NylasClient`], the HTTP implementation
//! - Wire types and response envelopes
//! - Normalization of raw messages into canonical models

pub mod api;
mod client;
mod error;
mod normalize;

pub use api::{Draft, DraftPayload, Grant, ListEnvelope, ObjectEnvelope, RawMessage, RawThread};
pub use client::NylasClient;
pub use error::ProviderError;
pub use normalize::{MappingError, normalize_message, normalize_messages};

use crate::models::redact;

/// Opaque per-account bearer credential
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&redact(&self.0)).finish()
    }
}

/// Parameters for a list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: usize,
    pub offset: Option<usize>,
    /// Comma-separated field projection
    pub select: Option<String>,
    /// Lower bound on received date, seconds since the epoch
    pub received_after: Option<i64>,
    /// Folder or label ids to restrict to
    pub in_folders: Vec<String>,
}

impl ListQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn select(mut self, fields: impl Into<String>) -> Self {
        self.select = Some(fields.into());
        self
    }

    pub fn received_after(mut self, epoch_secs: i64) -> Self {
        self.received_after = Some(epoch_secs);
        self
    }

    pub fn in_folders(mut self, folders: Vec<String>) -> Self {
        self.in_folders = folders;
        self
    }

    /// Encode as a URL query string, including the leading `?`
    pub fn to_query_string(&self) -> String {
        let mut pairs = vec![format!("limit={}", self.limit)];

        if let Some(offset) = self.offset {
            pairs.push(format!("offset={}", offset));
        }
        if let Some(select) = &self.select {
            pairs.push(format!("select={}", urlencoding::encode(select)));
        }
        if let Some(after) = self.received_after {
            pairs.push(format!("received_after={}", after));
        }
        if !self.in_folders.is_empty() {
            pairs.push(format!("in={}", urlencoding::encode(&self.in_folders.join(","))));
        }

        format!("?{}", pairs.join("&"))
    }
}

/// Operations the core needs from a remote mail provider.
///
/// Implementations normalize response envelopes before returning, so callers
/// only ever see plain lists and objects.
pub trait MailProvider: Send + Sync {
    /// List raw messages for a grant
    fn list_messages(&self, identifier: &str, query: &ListQuery)
    -> Result<Vec<RawMessage>, ProviderError>;

    /// List raw threads for a grant
    fn list_threads(&self, identifier: &str, query: &ListQuery)
    -> Result<Vec<RawThread>, ProviderError>;

    /// Look up the grants visible to this credential
    fn get_account_info(&self) -> Result<Vec<Grant>, ProviderError>;

    /// Create a draft and return the provider's view of it
    fn create_draft(&self, identifier: &str, payload: &DraftPayload)
    -> Result<Draft, ProviderError>;

    /// Send a previously created draft
    fn send_draft(&self, identifier: &str, draft_id: &str) -> Result<RawMessage, ProviderError>;
}

//! Per-account sync orchestration

use log::{info, warn};
use std::time::Instant;

use super::merge::{MergeStats, merge_messages};
use super::resolver::{
    FetchAttempt, Readiness, ReadinessPolicy, StrategyId, resolve_identifier, resolve_messages,
    wait_for_readiness,
};
use crate::config::SyncOptions;
use crate::provider::{MailProvider, ProviderError, normalize_messages};
use crate::storage::MailStore;

/// Errors that abort an account sync
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("provider rejected the account credential: {0}")]
    Credential(#[source] ProviderError),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Summary of one sync run
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Identifier the provider was queried with
    pub identifier: String,
    /// Whether the readiness poll saw data before its deadline
    pub ready: bool,
    pub winner: Option<StrategyId>,
    pub attempts: Vec<FetchAttempt>,
    /// Raw records returned by the winning strategy
    pub fetched: usize,
    /// Raw records that could not be mapped and were skipped
    pub mapping_errors: usize,
    pub merge: MergeStats,
    pub duration_ms: u64,
}

/// Sync one stored account from the provider into storage.
///
/// Zero fetched messages is a valid, empty report.
pub fn sync_account(
    provider: &dyn MailProvider,
    store: &dyn MailStore,
    account_id: &str,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    let start = Instant::now();

    let account = store
        .get_account(account_id)?
        .ok_or_else(|| SyncError::AccountNotFound(account_id.to_string()))?;

    let identifier = resolve_identifier(provider, &account.id);
    info!("Syncing account {} as {}", account.id, identifier);

    let ready = match wait_for_readiness(provider, &identifier, ReadinessPolicy::from(options)) {
        Readiness::Ready => true,
        Readiness::NotReadyTimedOut => {
            warn!("Mailbox {} had no data before the deadline, continuing", identifier);
            false
        }
        Readiness::Error(e) => return Err(SyncError::Credential(e)),
    };

    let resolution = resolve_messages(provider, &identifier, options).map_err(SyncError::Credential)?;
    let fetched = resolution.items.len();

    let (messages, mapping_errors) = normalize_messages(resolution.items);
    for e in &mapping_errors {
        warn!("Skipping unmappable record: {}", e);
    }

    // Messages are owned by the local account, whatever id the provider used
    let merge = merge_messages(store, &account.id, messages);

    let report = SyncReport {
        identifier,
        ready,
        winner: resolution.winner,
        attempts: resolution.attempts,
        fetched,
        mapping_errors: mapping_errors.len(),
        merge,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Sync of {} done: fetched {}, stored {}, threads {}, errors {} in {}ms",
        account.id,
        report.fetched,
        report.merge.messages_stored,
        report.merge.threads_updated,
        report.merge.errors + report.mapping_errors,
        report.duration_ms
    );

    Ok(report)
}

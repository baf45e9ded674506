//! Sync engine for fetching and storing mail
//!
//! Provides idempotent sync operations that can be safely retried:
//! strategy resolution against the provider, mapping to canonical records,
//! and merging into storage.

mod engine;
pub mod merge;
pub mod resolver;

pub use engine::{SyncError, SyncReport, sync_account};
pub use merge::{MergeStats, compute_thread, merge_messages};
pub use resolver::{
    FetchAttempt, FetchStrategy, Readiness, ReadinessPolicy, Resolution, StrategyId, resolve,
    resolve_identifier, resolve_messages, resolve_threads, select_best, strategies,
    wait_for_readiness,
};

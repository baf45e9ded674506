//! Fetch strategy resolution
//!
//! Providers disagree on which list parameters return the most complete
//! result for a freshly connected mailbox. The resolver runs an ordered list
//! of query variants one after another, records how each one fared, and keeps
//! the single largest result set.

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::SyncOptions;
use crate::provider::{ListQuery, MailProvider, ProviderError, RawMessage, RawThread};

/// Named query variants, in the order they are attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyId {
    Unfiltered,
    FieldRestricted,
    AllTime,
    RecentWindow,
    FolderScoped,
    HighLimit,
}

impl StrategyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::Unfiltered => "unfiltered",
            StrategyId::FieldRestricted => "field_restricted",
            StrategyId::AllTime => "all_time",
            StrategyId::RecentWindow => "recent_window",
            StrategyId::FolderScoped => "folder_scoped",
            StrategyId::HighLimit => "high_limit",
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One query variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchStrategy {
    pub id: StrategyId,
    pub query: ListQuery,
}

impl FetchStrategy {
    fn new(id: StrategyId, query: ListQuery) -> Self {
        Self { id, query }
    }
}

/// Build the strategy list for a sync run.
///
/// `now` anchors the recency window.
pub fn strategies(options: &SyncOptions, now: DateTime<Utc>) -> Vec<FetchStrategy> {
    let limit = options.limit;
    // An out-of-range window degrades to all time
    let window_start = TimeDelta::try_days(options.recency_days)
        .and_then(|window| now.checked_sub_signed(window))
        .map(|start| start.timestamp())
        .unwrap_or(0);

    vec![
        FetchStrategy::new(StrategyId::Unfiltered, ListQuery::new(limit).offset(0)),
        FetchStrategy::new(
            StrategyId::FieldRestricted,
            ListQuery::new(limit).select(options.select_fields.clone()),
        ),
        FetchStrategy::new(StrategyId::AllTime, ListQuery::new(limit).received_after(0)),
        FetchStrategy::new(
            StrategyId::RecentWindow,
            ListQuery::new(limit).received_after(window_start),
        ),
        FetchStrategy::new(
            StrategyId::FolderScoped,
            ListQuery::new(limit).in_folders(options.folders.clone()),
        ),
        FetchStrategy::new(StrategyId::HighLimit, ListQuery::new(options.high_limit)),
    ]
}

/// Outcome of one strategy. A failed attempt counts as zero results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    pub strategy: StrategyId,
    pub count: usize,
    pub error: Option<ProviderError>,
}

/// The winning result set plus the full attempt log
#[derive(Debug, Clone)]
pub struct Resolution<T> {
    /// `None` only when every attempt failed
    pub winner: Option<StrategyId>,
    pub items: Vec<T>,
    pub attempts: Vec<FetchAttempt>,
}

impl<T> Resolution<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Index of the largest count; ties keep the earliest
pub fn select_best(counts: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (idx, &count) in counts.iter().enumerate() {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((idx, count)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Run every strategy through `fetch` and keep the largest result.
///
/// Transient failures are recorded and treated as empty. A credential
/// failure aborts the run, since every later variant would fail the same way.
pub fn resolve<T, F>(strategies: &[FetchStrategy], mut fetch: F) -> Result<Resolution<T>, ProviderError>
where
    F: FnMut(&ListQuery) -> Result<Vec<T>, ProviderError>,
{
    let mut attempts = Vec::with_capacity(strategies.len());
    let mut results: Vec<(StrategyId, Vec<T>)> = Vec::new();

    for strategy in strategies {
        match fetch(&strategy.query) {
            Ok(items) => {
                debug!("Strategy {} returned {} items", strategy.id, items.len());
                attempts.push(FetchAttempt {
                    strategy: strategy.id,
                    count: items.len(),
                    error: None,
                });
                results.push((strategy.id, items));
            }
            Err(e) if e.is_credential() => {
                warn!("Strategy {} rejected credential: {}", strategy.id, e);
                return Err(e);
            }
            Err(e) => {
                warn!("Strategy {} failed: {}", strategy.id, e);
                attempts.push(FetchAttempt {
                    strategy: strategy.id,
                    count: 0,
                    error: Some(e),
                });
            }
        }
    }

    // Failed attempts never win, even over an empty success
    let counts: Vec<usize> = results.iter().map(|(_, items)| items.len()).collect();
    let (winner, items) = match select_best(&counts) {
        Some(idx) => {
            let (id, items) = results.swap_remove(idx);
            (Some(id), items)
        }
        None => (None, Vec::new()),
    };

    if let Some(id) = winner {
        info!("Strategy {} won with {} items", id, items.len());
    }

    Ok(Resolution {
        winner,
        items,
        attempts,
    })
}

/// Resolve the best message listing for a grant
pub fn resolve_messages(
    provider: &dyn MailProvider,
    identifier: &str,
    options: &SyncOptions,
) -> Result<Resolution<RawMessage>, ProviderError> {
    let list = strategies(options, Utc::now());
    resolve(&list, |query| provider.list_messages(identifier, query))
}

/// Resolve the best thread listing for a grant
pub fn resolve_threads(
    provider: &dyn MailProvider,
    identifier: &str,
    options: &SyncOptions,
) -> Result<Resolution<RawThread>, ProviderError> {
    let list = strategies(options, Utc::now());
    resolve(&list, |query| provider.list_threads(identifier, query))
}

/// Result of waiting for a freshly connected mailbox to have data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// The deadline passed without a non-empty probe. Callers proceed anyway.
    NotReadyTimedOut,
    Error(ProviderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl ReadinessPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

impl From<&SyncOptions> for ReadinessPolicy {
    fn from(options: &SyncOptions) -> Self {
        Self::new(options.readiness_timeout, options.readiness_interval)
    }
}

/// Poll with a one-message probe until the mailbox returns data.
///
/// Transient probe errors keep polling. Sleeps are clipped to the deadline.
pub fn wait_for_readiness(
    provider: &dyn MailProvider,
    identifier: &str,
    policy: ReadinessPolicy,
) -> Readiness {
    let deadline = Instant::now() + policy.timeout;
    let probe = ListQuery::new(1);

    loop {
        match provider.list_messages(identifier, &probe) {
            Ok(items) if !items.is_empty() => return Readiness::Ready,
            Ok(_) => debug!("Mailbox {} not ready yet", identifier),
            Err(e) if e.is_credential() => return Readiness::Error(e),
            Err(e) => debug!("Readiness probe failed: {}", e),
        }

        let now = Instant::now();
        if now >= deadline {
            warn!("Timed out waiting for mailbox {} to have data", identifier);
            return Readiness::NotReadyTimedOut;
        }
        std::thread::sleep(policy.interval.min(deadline - now));
    }
}

/// The provider's identifier for this credential, falling back to the
/// locally stored account id when the lookup fails or returns nothing.
pub fn resolve_identifier(provider: &dyn MailProvider, local_id: &str) -> String {
    match provider.get_account_info() {
        Ok(grants) => match grants.into_iter().find(|g| !g.id.is_empty()) {
            Some(grant) => grant.id,
            None => {
                debug!("No grants returned, using stored id {}", local_id);
                local_id.to_string()
            }
        },
        Err(e) => {
            warn!("Account info lookup failed, using stored id {}: {}", local_id, e);
            local_id.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Draft, DraftPayload, Grant};
    use std::sync::Mutex;

    /// Provider whose list calls replay a fixed script
    struct Scripted {
        responses: Mutex<Vec<Result<usize, ProviderError>>>,
        grants: Result<Vec<Grant>, ProviderError>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<usize, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                grants: Ok(Vec::new()),
            }
        }

        fn next(&self) -> Result<usize, ProviderError> {
            self.responses.lock().unwrap().pop().unwrap_or(Ok(0))
        }
    }

    fn raw_messages(n: usize) -> Vec<RawMessage> {
        (0..n)
            .map(|i| RawMessage {
                id: Some(format!("m{}", i)),
                ..Default::default()
            })
            .collect()
    }

    impl MailProvider for Scripted {
        fn list_messages(&self, _: &str, _: &ListQuery) -> Result<Vec<RawMessage>, ProviderError> {
            self.next().map(raw_messages)
        }

        fn list_threads(&self, _: &str, _: &ListQuery) -> Result<Vec<RawThread>, ProviderError> {
            self.next().map(|n| (0..n).map(|_| RawThread::default()).collect())
        }

        fn get_account_info(&self) -> Result<Vec<Grant>, ProviderError> {
            self.grants.clone()
        }

        fn create_draft(&self, _: &str, _: &DraftPayload) -> Result<Draft, ProviderError> {
            unimplemented!()
        }

        fn send_draft(&self, _: &str, _: &str) -> Result<RawMessage, ProviderError> {
            unimplemented!()
        }
    }

    fn transient() -> ProviderError {
        ProviderError::Status {
            operation: "list messages",
            status: 500,
        }
    }

    #[test]
    fn test_strategy_order_and_queries() {
        let now = DateTime::from_timestamp(1_709_251_200, 0).unwrap();
        let list = strategies(&SyncOptions::default(), now);
        let ids: Vec<_> = list.iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            vec![
                StrategyId::Unfiltered,
                StrategyId::FieldRestricted,
                StrategyId::AllTime,
                StrategyId::RecentWindow,
                StrategyId::FolderScoped,
                StrategyId::HighLimit,
            ]
        );
        assert_eq!(list[2].query.received_after, Some(0));
        assert_eq!(list[3].query.received_after, Some(1_709_251_200 - 30 * 86_400));
        assert_eq!(list[4].query.in_folders, vec!["INBOX", "SENT", "DRAFT"]);
        assert_eq!(list[5].query.limit, 500);
    }

    #[test]
    fn test_oversized_recency_window_falls_back_to_epoch() {
        let now = DateTime::from_timestamp(1_709_251_200, 0).unwrap();
        let options = SyncOptions {
            recency_days: i64::MAX,
            ..SyncOptions::default()
        };
        let list = strategies(&options, now);
        assert_eq!(list[3].id, StrategyId::RecentWindow);
        assert_eq!(list[3].query.received_after, Some(0));
    }

    #[test]
    fn test_empty_success_beats_earlier_failure() {
        let provider = Scripted::new(vec![Err(transient()), Ok(0), Err(transient())]);
        let list = strategies(&SyncOptions::default(), Utc::now());
        let resolution = resolve(&list[..3], |_| provider.next().map(raw_messages)).unwrap();
        assert_eq!(resolution.winner, Some(StrategyId::FieldRestricted));
        assert!(resolution.items.is_empty());
    }

    #[test]
    fn test_select_best() {
        assert_eq!(select_best(&[3, 0, 7, 2, 5, 1]), Some(2));
        assert_eq!(select_best(&[4, 4, 1]), Some(0));
        assert_eq!(select_best(&[0, 0]), Some(0));
        assert_eq!(select_best(&[]), None);
    }

    #[test]
    fn test_largest_result_wins() {
        let provider = Scripted::new(vec![Ok(3), Ok(0), Ok(7), Ok(2), Ok(5), Ok(1)]);
        let res = resolve_messages(&provider, "grant", &SyncOptions::default()).unwrap();

        assert_eq!(res.winner, Some(StrategyId::AllTime));
        assert_eq!(res.items.len(), 7);
        let counts: Vec<_> = res.attempts.iter().map(|a| a.count).collect();
        assert_eq!(counts, vec![3, 0, 7, 2, 5, 1]);
        assert_eq!(select_best(&counts), Some(2));
    }

    #[test]
    fn test_failures_count_as_zero() {
        let provider = Scripted::new(vec![
            Err(transient()),
            Ok(2),
            Err(transient()),
            Ok(2),
            Ok(0),
            Ok(1),
        ]);
        let res = resolve_messages(&provider, "grant", &SyncOptions::default()).unwrap();

        assert_eq!(res.winner, Some(StrategyId::FieldRestricted));
        assert_eq!(res.attempts.len(), 6);
        assert_eq!(res.attempts[0].count, 0);
        assert!(res.attempts[0].error.is_some());
    }

    #[test]
    fn test_all_failures_yield_empty() {
        let provider = Scripted::new((0..6).map(|_| Err(transient())).collect());
        let res = resolve_messages(&provider, "grant", &SyncOptions::default()).unwrap();
        assert_eq!(res.winner, None);
        assert!(res.is_empty());
    }

    #[test]
    fn test_credential_error_propagates() {
        let provider = Scripted::new(vec![Ok(3), Err(ProviderError::InvalidCredential { status: 401 })]);
        let err = resolve_messages(&provider, "grant", &SyncOptions::default()).unwrap_err();
        assert!(err.is_credential());
    }

    #[test]
    fn test_threads_resolve_the_same_way() {
        let provider = Scripted::new(vec![Ok(1), Ok(4), Ok(4), Ok(0), Ok(2), Ok(3)]);
        let res = resolve_threads(&provider, "grant", &SyncOptions::default()).unwrap();
        assert_eq!(res.winner, Some(StrategyId::FieldRestricted));
        assert_eq!(res.items.len(), 4);
    }

    #[test]
    fn test_readiness_ready_after_empty_probes() {
        let provider = Scripted::new(vec![Ok(0), Err(transient()), Ok(1)]);
        let policy = ReadinessPolicy::new(Duration::from_secs(5), Duration::from_millis(1));
        assert_eq!(wait_for_readiness(&provider, "grant", policy), Readiness::Ready);
    }

    #[test]
    fn test_readiness_times_out_within_deadline() {
        let provider = Scripted::new(Vec::new());
        let policy = ReadinessPolicy::new(Duration::from_millis(100), Duration::from_millis(40));

        let start = Instant::now();
        let result = wait_for_readiness(&provider, "grant", policy);

        assert_eq!(result, Readiness::NotReadyTimedOut);
        assert!(start.elapsed() < Duration::from_millis(100) + Duration::from_millis(250));
    }

    #[test]
    fn test_readiness_credential_error() {
        let provider = Scripted::new(vec![Err(ProviderError::InvalidCredential { status: 403 })]);
        let policy = ReadinessPolicy::new(Duration::from_secs(5), Duration::from_millis(1));
        assert!(matches!(
            wait_for_readiness(&provider, "grant", policy),
            Readiness::Error(_)
        ));
    }

    #[test]
    fn test_identifier_prefers_grant_id() {
        let mut provider = Scripted::new(Vec::new());
        provider.grants = Ok(vec![Grant {
            id: "grant-123".to_string(),
            ..Default::default()
        }]);
        assert_eq!(resolve_identifier(&provider, "local"), "grant-123");

        provider.grants = Ok(Vec::new());
        assert_eq!(resolve_identifier(&provider, "local"), "local");

        provider.grants = Err(transient());
        assert_eq!(resolve_identifier(&provider, "local"), "local");
    }
}

//! # Sync Run Model
//!
//! A run is one bounded attempt to synchronize every pending photo across
//! every authenticated provider. Runs live only in memory; the persistent
//! record of progress is the per-photo sync status.

use core_auth::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::time::Instant;
use uuid::Uuid;

use crate::cancellation::CancellationToken;

/// Unique identifier for a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a provider's portion of a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ProviderOutcome {
    /// Every pending photo was uploaded or found remotely
    Success,
    /// Not authenticated; not counted as a failure
    Skipped,
    /// Authentication failed or the pending set could not be read
    Failed(String),
    /// A second consecutive rate-limit response
    RateLimited,
    QuotaExceeded,
    /// The run's token was observed before the provider finished
    Cancelled,
    /// The provider task had not finished by the deadline
    TimedOut,
}

impl ProviderOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderOutcome::Success => "success",
            ProviderOutcome::Skipped => "skipped",
            ProviderOutcome::Failed(_) => "failed",
            ProviderOutcome::RateLimited => "rate_limited",
            ProviderOutcome::QuotaExceeded => "quota_exceeded",
            ProviderOutcome::Cancelled => "cancelled",
            ProviderOutcome::TimedOut => "timed_out",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProviderOutcome::Success)
    }
}

impl fmt::Display for ProviderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderOutcome::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Per-provider counts and outcome for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderReport {
    pub provider: ProviderKind,
    pub outcome: ProviderOutcome,
    /// Photos confirmed by an upload in this run
    pub uploaded: u64,
    /// Photos found in the remote listing and marked synced without upload
    pub already_present: u64,
    /// Photos whose upload failed and that remain pending or failed
    pub failed: u64,
    /// Photos not attempted because the provider stopped early
    pub skipped: u64,
}

impl ProviderReport {
    /// An empty report, optimistically marked successful.
    pub fn new(provider: ProviderKind) -> Self {
        Self::with_outcome(provider, ProviderOutcome::Success)
    }

    pub fn with_outcome(provider: ProviderKind, outcome: ProviderOutcome) -> Self {
        Self {
            provider,
            outcome,
            uploaded: 0,
            already_present: 0,
            failed: 0,
            skipped: 0,
        }
    }

    /// Number of photos that ended this run synced.
    pub fn succeeded(&self) -> u64 {
        self.uploaded + self.already_present
    }
}

/// Aggregate result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SyncRunResult {
    /// Every authenticated provider succeeded
    Success {
        reports: BTreeMap<ProviderKind, ProviderReport>,
    },
    PartialFailure {
        reports: BTreeMap<ProviderKind, ProviderReport>,
    },
}

impl SyncRunResult {
    /// Classify a finished run. Skipped providers never count as failures,
    /// so a run without authenticated providers is a success.
    pub fn aggregate(reports: BTreeMap<ProviderKind, ProviderReport>) -> Self {
        let all_succeeded = reports.values().all(|report| {
            matches!(
                report.outcome,
                ProviderOutcome::Success | ProviderOutcome::Skipped
            )
        });

        if all_succeeded {
            SyncRunResult::Success { reports }
        } else {
            SyncRunResult::PartialFailure { reports }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SyncRunResult::Success { .. })
    }

    pub fn reports(&self) -> &BTreeMap<ProviderKind, ProviderReport> {
        match self {
            SyncRunResult::Success { reports } | SyncRunResult::PartialFailure { reports } => {
                reports
            }
        }
    }

    pub fn report(&self, provider: ProviderKind) -> Option<&ProviderReport> {
        self.reports().get(&provider)
    }

    pub fn outcome(&self, provider: ProviderKind) -> Option<&ProviderOutcome> {
        self.report(provider).map(|report| &report.outcome)
    }
}

/// Bookkeeping for the run in progress.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub id: SyncRunId,
    pub started_at: Instant,
    pub deadline: Instant,
    pub token: CancellationToken,
    pub reports: BTreeMap<ProviderKind, ProviderReport>,
}

impl SyncRun {
    pub fn new(deadline: Instant) -> Self {
        Self {
            id: SyncRunId::new(),
            started_at: Instant::now(),
            deadline,
            token: CancellationToken::new(),
            reports: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, report: ProviderReport) {
        self.reports.insert(report.provider, report);
    }

    /// Close the run and classify it.
    pub fn finish(self) -> SyncRunResult {
        SyncRunResult::aggregate(self.reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reports(outcomes: &[(ProviderKind, ProviderOutcome)]) -> BTreeMap<ProviderKind, ProviderReport> {
        outcomes
            .iter()
            .map(|(provider, outcome)| {
                (
                    *provider,
                    ProviderReport::with_outcome(*provider, outcome.clone()),
                )
            })
            .collect()
    }

    #[test]
    fn test_skipped_providers_do_not_fail_the_run() {
        let result = SyncRunResult::aggregate(reports(&[
            (ProviderKind::Dropbox, ProviderOutcome::Success),
            (ProviderKind::OneDrive, ProviderOutcome::Skipped),
        ]));

        assert!(result.is_success());
    }

    #[test]
    fn test_any_non_success_is_partial_failure() {
        let result = SyncRunResult::aggregate(reports(&[
            (ProviderKind::Dropbox, ProviderOutcome::Success),
            (ProviderKind::GoogleDrive, ProviderOutcome::TimedOut),
        ]));

        assert!(!result.is_success());
        assert_eq!(
            result.outcome(ProviderKind::GoogleDrive),
            Some(&ProviderOutcome::TimedOut)
        );
    }

    #[test]
    fn test_empty_run_is_success() {
        assert!(SyncRunResult::aggregate(BTreeMap::new()).is_success());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(ProviderOutcome::QuotaExceeded.to_string(), "quota_exceeded");
        assert_eq!(
            ProviderOutcome::Failed("expired session".to_string()).to_string(),
            "failed: expired session"
        );
    }
}

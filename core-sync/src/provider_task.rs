//! # Provider Synchronization Task
//!
//! The composite operation run once per authenticated provider per run:
//!
//! 1. Snapshot the provider's pending set from the [`PhotoSource`]
//! 2. List each destination folder once and mark photos the remote already
//!    holds as synced (duplicate suppression across interrupted runs)
//! 3. Upload the rest oldest-capture-first, polling the run's token before
//!    each upload
//!
//! ## Failure policy
//!
//! | Upload error      | Photo                 | Provider task            |
//! |-------------------|-----------------------|--------------------------|
//! | `Network`         | stays pending         | continues                |
//! | `Other`           | marked failed         | continues                |
//! | `RateLimited`     | stays pending         | backs off once, then `RateLimited` |
//! | `QuotaExceeded`   | stays pending         | stops, `QuotaExceeded`   |
//! | `Auth`            | stays pending         | stops, `Failed`          |
//! | `Cancelled`       | stays pending         | stops, `Cancelled`       |

use core_auth::ProviderKind;
use core_library::{Photo, PhotoSource};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_runtime::logging::strip_path;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::cancellation::CancellationToken;
use crate::client::{RemoteError, RemoteStorageClient};
use crate::run::{ProviderOutcome, ProviderReport, SyncRunId};

/// Everything a provider task needs from its run.
#[derive(Clone)]
pub struct SyncContext {
    pub run_id: SyncRunId,
    pub source: Arc<dyn PhotoSource>,
    pub token: CancellationToken,
    pub settings: SyncSettings,
    pub event_bus: Option<EventBus>,
}

impl SyncContext {
    pub fn new(source: Arc<dyn PhotoSource>, token: CancellationToken, settings: SyncSettings) -> Self {
        Self {
            run_id: SyncRunId::new(),
            source,
            token,
            settings,
            event_bus: None,
        }
    }

    pub fn with_run_id(mut self, run_id: SyncRunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }
}

type FolderKey = (String, String);

/// Result of attempting one photo.
enum Step {
    Next,
    Stop(ProviderOutcome),
}

/// Run one provider's portion of a sync run.
#[instrument(skip_all, fields(provider = client.provider().as_str(), run_id = %ctx.run_id))]
pub async fn synchronize<C>(client: &C, ctx: &SyncContext) -> ProviderReport
where
    C: RemoteStorageClient + ?Sized,
{
    let provider = client.provider();
    let mut report = ProviderReport::new(provider);

    if ctx.token.is_cancelled() {
        report.outcome = ProviderOutcome::Cancelled;
        return report;
    }

    let mut pending = match ctx.source.list_pending(provider).await {
        Ok(pending) => pending,
        Err(e) => {
            warn!(error = %e, "Could not read pending photos");
            report.outcome = ProviderOutcome::Failed(format!("pending set unavailable: {}", e));
            return report;
        }
    };
    pending.sort_by_key(|photo| (photo.captured_at, photo.id));

    info!(pending = pending.len(), "Starting provider synchronization");

    // A remote name shared by several pending photos cannot tell which of
    // them the remote copy belongs to.
    let mut name_counts: HashMap<(&str, &str, &str), usize> = HashMap::new();
    for photo in &pending {
        *name_counts
            .entry((photo.album.as_str(), photo.folder.as_str(), photo.file_name.as_str()))
            .or_default() += 1;
    }

    let mut remote_folders: HashMap<FolderKey, HashSet<String>> = HashMap::new();
    let mut consecutive_rate_limits = 0u32;
    let total = pending.len() as u64;
    let mut attempted = 0u64;

    for photo in &pending {
        if ctx.token.is_cancelled() {
            info!("Token set, provider stopping");
            report.outcome = ProviderOutcome::Cancelled;
            report.skipped = total - attempted;
            return report;
        }

        let key = (photo.album.clone(), photo.folder.clone());

        if !remote_folders.contains_key(&key) {
            match client.list_remote_folder(&photo.album, &photo.folder).await {
                Ok(names) => {
                    debug!(album = %photo.album, folder = %photo.folder, remote = names.len(), "Listed remote folder");
                    remote_folders.insert(key.clone(), names);
                }
                Err(RemoteError::Auth(message)) => {
                    warn!(%message, "Authentication rejected while listing");
                    report.outcome = ProviderOutcome::Failed(format!("authentication: {}", message));
                    report.skipped = total - attempted;
                    return report;
                }
                Err(e) => {
                    // Without a listing the photo may be uploaded twice; duplicates are tolerated.
                    warn!(album = %photo.album, folder = %photo.folder, error = %e, "Remote listing failed");
                    remote_folders.insert(key.clone(), HashSet::new());
                }
            }
        }

        let ambiguous = name_counts
            .get(&(photo.album.as_str(), photo.folder.as_str(), photo.file_name.as_str()))
            .is_some_and(|&count| count > 1);
        if ambiguous {
            debug!(photo_id = %photo.id, file = %photo.file_name, "Remote name shared by several pending photos");
        }

        if !ambiguous
            && remote_folders
                .get(&key)
                .is_some_and(|names| names.contains(&photo.file_name))
        {
            match ctx.source.mark_synced(&photo.id, provider, None).await {
                Ok(()) => report.already_present += 1,
                Err(e) => warn!(photo_id = %photo.id, error = %e, "Failed to record remote copy"),
            }
            attempted += 1;
            continue;
        }

        let step = upload_with_backoff(
            client,
            ctx,
            photo,
            &mut consecutive_rate_limits,
            &mut report,
        )
        .await;
        attempted += 1;

        if let Step::Stop(outcome) = step {
            info!(outcome = outcome.as_str(), "Provider stopped early");
            report.outcome = outcome;
            report.skipped = total - attempted;
            return report;
        }
    }

    info!(
        uploaded = report.uploaded,
        already_present = report.already_present,
        failed = report.failed,
        "Provider synchronization finished"
    );
    report
}

/// Upload one photo, backing off once on a rate-limit response.
async fn upload_with_backoff<C>(
    client: &C,
    ctx: &SyncContext,
    photo: &Photo,
    consecutive_rate_limits: &mut u32,
    report: &mut ProviderReport,
) -> Step
where
    C: RemoteStorageClient + ?Sized,
{
    let provider = client.provider();

    loop {
        if ctx.token.is_cancelled() {
            debug!(photo_id = %photo.id, "Token set before upload");
            return Step::Stop(ProviderOutcome::Cancelled);
        }

        record(ctx.source.mark_uploading(&photo.id, provider).await, photo, "uploading");
        let path = photo.content.path().to_string_lossy();
        debug!(photo_id = %photo.id, file = strip_path(&path), "Uploading photo");

        let result = client
            .upload(photo, &photo.album, &photo.folder, &ctx.token)
            .await;

        let error = match result {
            Ok(receipt) => {
                *consecutive_rate_limits = 0;
                record(
                    ctx.source
                        .mark_synced(&photo.id, provider, Some(&receipt.remote_id))
                        .await,
                    photo,
                    "synced",
                );
                report.uploaded += 1;
                ctx.emit(SyncEvent::PhotoSynced {
                    run_id: ctx.run_id.to_string(),
                    provider: provider.as_str().to_string(),
                    photo_id: photo.id.to_string(),
                });
                return Step::Next;
            }
            Err(error) => error,
        };

        if let RemoteError::RateLimited { retry_after } = error {
            *consecutive_rate_limits += 1;
            reset_pending(ctx, provider, photo).await;

            if *consecutive_rate_limits >= 2 {
                warn!(photo_id = %photo.id, "Rate limited twice in a row");
                return Step::Stop(ProviderOutcome::RateLimited);
            }

            let backoff = ctx.settings.backoff_for(retry_after);
            info!(photo_id = %photo.id, ?backoff, "Rate limited, backing off");
            tokio::time::sleep(backoff).await;
            continue;
        }

        *consecutive_rate_limits = 0;

        return match error {
            RemoteError::Network(message) => {
                warn!(photo_id = %photo.id, %message, "Upload failed, photo stays pending");
                reset_pending(ctx, provider, photo).await;
                report.failed += 1;
                Step::Next
            }
            RemoteError::Other(message) => {
                warn!(photo_id = %photo.id, %message, "Upload rejected");
                record(
                    ctx.source.mark_failed(&photo.id, provider, &message).await,
                    photo,
                    "failed",
                );
                report.failed += 1;
                Step::Next
            }
            RemoteError::QuotaExceeded(message) => {
                warn!(photo_id = %photo.id, %message, "Storage quota exceeded");
                reset_pending(ctx, provider, photo).await;
                Step::Stop(ProviderOutcome::QuotaExceeded)
            }
            RemoteError::Auth(message) => {
                warn!(photo_id = %photo.id, %message, "Authentication rejected");
                reset_pending(ctx, provider, photo).await;
                Step::Stop(ProviderOutcome::Failed(format!("authentication: {}", message)))
            }
            RemoteError::Cancelled => {
                reset_pending(ctx, provider, photo).await;
                Step::Stop(ProviderOutcome::Cancelled)
            }
            RemoteError::RateLimited { .. } => Step::Stop(ProviderOutcome::RateLimited),
        };
    }
}

async fn reset_pending(ctx: &SyncContext, provider: ProviderKind, photo: &Photo) {
    record(
        ctx.source.mark_pending(&photo.id, provider).await,
        photo,
        "pending",
    );
}

fn record(result: core_library::Result<()>, photo: &Photo, state: &str) {
    if let Err(e) = result {
        warn!(photo_id = %photo.id, state, error = %e, "Failed to persist sync status");
    }
}

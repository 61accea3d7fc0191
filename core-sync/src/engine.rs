//! # Synchronization Engine
//!
//! Runs one concurrent task per authenticated provider and enforces the
//! execution-window deadline.
//!
//! ## Deadline handling
//!
//! Provider tasks are never pre-empted. At `deadline - cancellation_epsilon`
//! the run's [`CancellationToken`] is set so providers stop between uploads;
//! any task still running at `deadline` is recorded as
//! [`ProviderOutcome::TimedOut`] and detached. A detached upload that later
//! completes still marks its photo synced, which is safe because a synced
//! state never reverts.
//!
//! ```rust,ignore
//! let engine = SynchronizationEngine::new(source, settings, event_bus);
//! engine.register_client(Arc::new(dropbox)).await;
//!
//! let deadline = tokio::time::Instant::now() + window.budget;
//! let result = engine.run_once(deadline).await?;
//! ```

use core_auth::ProviderKind;
use core_library::PhotoSource;
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::cancellation::CancellationToken;
use crate::client::RemoteStorageClient;
use crate::error::{Result, SyncError};
use crate::provider_task::SyncContext;
use crate::run::{ProviderOutcome, ProviderReport, SyncRun, SyncRunResult};

/// Orchestrates provider tasks for one run at a time.
pub struct SynchronizationEngine {
    clients: RwLock<BTreeMap<ProviderKind, Arc<dyn RemoteStorageClient>>>,
    source: Arc<dyn PhotoSource>,
    settings: SyncSettings,
    event_bus: EventBus,
    /// Token of the run in progress, if any
    current: Mutex<Option<CancellationToken>>,
}

impl SynchronizationEngine {
    pub fn new(source: Arc<dyn PhotoSource>, settings: SyncSettings, event_bus: EventBus) -> Self {
        Self {
            clients: RwLock::new(BTreeMap::new()),
            source,
            settings,
            event_bus,
            current: Mutex::new(None),
        }
    }

    /// Register (or replace) the client for its provider.
    pub async fn register_client(&self, client: Arc<dyn RemoteStorageClient>) {
        let provider = client.provider();
        self.clients.write().await.insert(provider, client);
        info!(provider = provider.as_str(), "Registered remote storage client");
    }

    pub async fn registered_providers(&self) -> Vec<ProviderKind> {
        self.clients.read().await.keys().copied().collect()
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Set the current run's token immediately.
    ///
    /// Returns `false` when no run is in progress or it was already cancelled.
    pub fn cancel_all(&self) -> bool {
        let current = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match current {
            Some(token) => {
                let flipped = token.cancel();
                if flipped {
                    info!("Cancellation requested for the current sync run");
                }
                flipped
            }
            None => false,
        }
    }

    /// Synchronize every authenticated provider until done or `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RunInProgress`] if another run has not finished.
    /// Provider failures never surface as errors; they are reported in the
    /// returned [`SyncRunResult`].
    #[instrument(skip(self))]
    pub async fn run_once(&self, deadline: Instant) -> Result<SyncRunResult> {
        let mut run = SyncRun::new(deadline);
        let guard = CurrentRun::claim(&self.current, &run.token)?;

        self.execute(&mut run).await;
        drop(guard);

        let duration_ms = u64::try_from(run.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        let run_id = run.id;
        let result = run.finish();

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::RunCompleted {
                run_id: run_id.to_string(),
                success: result.is_success(),
                duration_ms,
            }))
            .ok();

        info!(
            run_id = %run_id,
            success = result.is_success(),
            duration_ms,
            "Sync run completed"
        );

        Ok(result)
    }

    async fn execute(&self, run: &mut SyncRun) {
        let clients: Vec<Arc<dyn RemoteStorageClient>> =
            self.clients.read().await.values().cloned().collect();

        let mut authenticated = Vec::new();
        for client in clients {
            if client.is_authenticated().await {
                authenticated.push(client);
            } else {
                info!(provider = client.provider().as_str(), "Provider not authenticated, skipping");
                let report =
                    ProviderReport::with_outcome(client.provider(), ProviderOutcome::Skipped);
                self.emit_provider_finished(run, &report);
                run.record(report);
            }
        }

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::RunStarted {
                run_id: run.id.to_string(),
                providers: authenticated
                    .iter()
                    .map(|client| client.provider().as_str().to_string())
                    .collect(),
            }))
            .ok();

        let ctx = SyncContext::new(self.source.clone(), run.token.clone(), self.settings.clone())
            .with_run_id(run.id)
            .with_event_bus(self.event_bus.clone());

        let cancel_at = run
            .deadline
            .checked_sub(self.settings.cancellation_epsilon)
            .unwrap_or(run.started_at);
        // A budget shorter than epsilon: providers must not start uploading.
        let mut token_set = cancel_at <= Instant::now();
        if token_set {
            self.request_cancellation(run);
        }

        let mut unfinished: BTreeSet<ProviderKind> = BTreeSet::new();
        let mut in_flight = FuturesUnordered::new();
        for client in authenticated {
            let provider = client.provider();
            let ctx = ctx.clone();
            let handle =
                tokio::spawn(async move { client.background_synchronization(&ctx).await });
            unfinished.insert(provider);
            in_flight.push(async move { (provider, handle.await) });
        }

        while !in_flight.is_empty() {
            let limit = if token_set { run.deadline } else { cancel_at };

            match tokio::time::timeout_at(limit, in_flight.next()).await {
                Ok(Some((provider, joined))) => {
                    unfinished.remove(&provider);
                    let report = match joined {
                        Ok(report) => report,
                        Err(e) => {
                            error!(provider = provider.as_str(), error = %e, "Provider task aborted");
                            ProviderReport::with_outcome(
                                provider,
                                ProviderOutcome::Failed(format!("task aborted: {}", e)),
                            )
                        }
                    };
                    self.emit_provider_finished(run, &report);
                    run.record(report);
                }
                Ok(None) => break,
                Err(_) if !token_set => {
                    token_set = true;
                    self.request_cancellation(run);
                }
                Err(_) => break,
            }
        }

        for provider in unfinished {
            warn!(provider = provider.as_str(), "Provider did not finish before the deadline");
            let report = ProviderReport::with_outcome(provider, ProviderOutcome::TimedOut);
            self.emit_provider_finished(run, &report);
            run.record(report);
        }
    }

    fn request_cancellation(&self, run: &SyncRun) {
        if run.token.cancel() {
            info!(run_id = %run.id, "Deadline approaching, cancelling providers");
        }
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::CancellationRequested {
                run_id: run.id.to_string(),
            }))
            .ok();
    }

    fn emit_provider_finished(&self, run: &SyncRun, report: &ProviderReport) {
        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::ProviderFinished {
                run_id: run.id.to_string(),
                provider: report.provider.as_str().to_string(),
                outcome: report.outcome.as_str().to_string(),
                uploaded: report.succeeded(),
                failed: report.failed,
            }))
            .ok();
    }
}

/// Occupies the engine's run slot until dropped.
///
/// Dropping also sets the run's token, so provider tasks left behind by an
/// abandoned `run_once` future stop at their next check.
struct CurrentRun<'a> {
    slot: &'a Mutex<Option<CancellationToken>>,
    token: CancellationToken,
}

impl<'a> CurrentRun<'a> {
    fn claim(slot: &'a Mutex<Option<CancellationToken>>, token: &CancellationToken) -> Result<Self> {
        let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if current.is_some() {
            return Err(SyncError::RunInProgress);
        }
        *current = Some(token.clone());
        Ok(Self {
            slot,
            token: token.clone(),
        })
    }
}

impl Drop for CurrentRun<'_> {
    fn drop(&mut self) {
        self.token.cancel();
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

//! # Sync Scheduler
//!
//! Decides when a run is due and keeps a recurring background window
//! requested.
//!
//! ## State Machine
//!
//! ```text
//! Idle ──schedule()──→ Scheduled ──window granted──→ Running
//!  ↑                                                   │
//!  └──────────── run finished, next window requested ──┘
//! ```
//!
//! `suspend()`/`resume()` are independent of that machine: a suspended
//! scheduler still holds its window request, but a granted window is released
//! without starting a run. A run already in progress is not affected.
//!
//! A failed window request is logged and leaves the scheduler `Idle`; the next
//! natural trigger (background transition, resume, finished run) tries again.

use async_trait::async_trait;
use bridge_traits::background::{
    BackgroundExecutor, BackgroundTaskHandler, ExecutionWindow, TaskConstraints, TaskId,
};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, SchedulerEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::engine::SynchronizationEngine;
use crate::error::{Result, SyncError};
use crate::run::SyncRunResult;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No window requested
    Idle,
    /// A window was requested and not yet granted
    Scheduled,
    /// A run is executing inside a granted window
    Running,
}

#[derive(Debug)]
struct SchedulerInner {
    state: SchedulerState,
    suspended: bool,
    last_result: Option<SyncRunResult>,
}

/// Drives the [`SynchronizationEngine`] from OS background windows.
pub struct SyncScheduler {
    engine: Arc<SynchronizationEngine>,
    executor: Arc<dyn BackgroundExecutor>,
    settings: SyncSettings,
    event_bus: EventBus,
    inner: Mutex<SchedulerInner>,
}

impl SyncScheduler {
    pub fn new(
        engine: Arc<SynchronizationEngine>,
        executor: Arc<dyn BackgroundExecutor>,
        event_bus: EventBus,
    ) -> Self {
        let settings = engine.settings().clone();
        Self {
            engine,
            executor,
            settings,
            event_bus,
            inner: Mutex::new(SchedulerInner {
                state: SchedulerState::Idle,
                suspended: false,
                last_result: None,
            }),
        }
    }

    /// Register this scheduler as the executor's handler for the sync task.
    ///
    /// The executor only holds a weak reference, so dropping the last
    /// `Arc<SyncScheduler>` turns later windows into no-ops.
    pub async fn register(self: &Arc<Self>) -> Result<()> {
        let handler = Arc::new(SchedulerTaskHandler {
            scheduler: Arc::downgrade(self),
        });

        self.executor
            .register_handler(&self.settings.task_id, handler)
            .await
            .map_err(|e| SyncError::Scheduling(e.to_string()))
    }

    pub fn state(&self) -> SchedulerState {
        self.lock().state
    }

    pub fn is_suspended(&self) -> bool {
        self.lock().suspended
    }

    /// Outcome of the most recent run, kept for diagnostics only.
    pub fn last_result(&self) -> Option<SyncRunResult> {
        self.lock().last_result.clone()
    }

    /// Request the next background window (`Idle → Scheduled`).
    ///
    /// A no-op unless the scheduler is idle. Returns whether a window is now
    /// requested.
    #[instrument(skip(self))]
    pub async fn schedule(&self) -> bool {
        {
            let mut inner = self.lock();
            if inner.state != SchedulerState::Idle {
                debug!(state = ?inner.state, "Window already requested or run in progress");
                return inner.state == SchedulerState::Scheduled;
            }
            inner.state = SchedulerState::Scheduled;
        }

        if self.request_window().await {
            true
        } else {
            self.lock().state = SchedulerState::Idle;
            false
        }
    }

    /// Block new runs from starting. Does not cancel a run in flight.
    pub fn suspend(&self) {
        let mut inner = self.lock();
        if !inner.suspended {
            inner.suspended = true;
            info!("Sync suspended");
            self.event_bus
                .emit(CoreEvent::Scheduler(SchedulerEvent::Suspended))
                .ok();
        }
    }

    /// Clear a suspension and make sure a window is requested.
    pub async fn resume(&self) -> bool {
        let was_suspended = {
            let mut inner = self.lock();
            std::mem::replace(&mut inner.suspended, false)
        };

        if was_suspended {
            info!("Sync resumed");
            self.event_bus
                .emit(CoreEvent::Scheduler(SchedulerEvent::Resumed))
                .ok();
        }

        self.schedule().await
    }

    /// Handle an OS-granted window (`Scheduled → Running → Idle`).
    ///
    /// Returns `None` when the window was released without running, either
    /// because syncing is suspended or a run is already in progress.
    #[instrument(skip(self, window), fields(task_id = %window.task_id, budget = ?window.budget))]
    pub async fn on_window_granted(&self, window: ExecutionWindow) -> Option<SyncRunResult> {
        {
            let mut inner = self.lock();
            if inner.state == SchedulerState::Running {
                warn!("Window granted while a run is in progress");
                return None;
            }
            if inner.suspended {
                inner.state = SchedulerState::Idle;
                info!("Sync suspended, releasing window without running");
                self.event_bus
                    .emit(CoreEvent::Scheduler(SchedulerEvent::WindowSkipped))
                    .ok();
                return None;
            }
            inner.state = SchedulerState::Running;
        }
        let running = RunningWindow { inner: &self.inner };

        let deadline = Instant::now() + window.budget;
        let result = match self.engine.run_once(deadline).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(error = %e, "Sync run did not start");
                None
            }
        };

        drop(running);
        if let Some(result) = &result {
            self.lock().last_result = Some(result.clone());
        }

        // Recurring schedule: the next window is requested regardless of outcome.
        self.schedule().await;
        result
    }

    /// The OS is revoking the window: stop providers at their next check.
    pub fn on_window_expired(&self) {
        info!("Background window expiring");
        self.engine.cancel_all();
    }

    async fn request_window(&self) -> bool {
        let constraints = TaskConstraints {
            requires_network: true,
            ..TaskConstraints::default()
        };

        match self
            .executor
            .schedule_once(&self.settings.task_id, self.settings.min_run_delay, constraints)
            .await
        {
            Ok(task_id) => {
                info!(
                    task_id = %task_id,
                    earliest_begin_secs = self.settings.min_run_delay.as_secs(),
                    "Background window requested"
                );
                self.event_bus
                    .emit(CoreEvent::Scheduler(SchedulerEvent::WindowRequested {
                        earliest_begin_secs: self.settings.min_run_delay.as_secs(),
                    }))
                    .ok();
                true
            }
            Err(e) => {
                warn!(error = %e, "Background window request declined");
                self.event_bus
                    .emit(CoreEvent::Scheduler(SchedulerEvent::ScheduleFailed {
                        message: e.to_string(),
                    }))
                    .ok();
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the scheduler to `Idle` when a window's run ends or is abandoned.
struct RunningWindow<'a> {
    inner: &'a Mutex<SchedulerInner>,
}

impl Drop for RunningWindow<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.state == SchedulerState::Running {
            inner.state = SchedulerState::Idle;
        }
    }
}

/// Executor-facing adapter that forwards windows to the scheduler.
struct SchedulerTaskHandler {
    scheduler: Weak<SyncScheduler>,
}

#[async_trait]
impl BackgroundTaskHandler for SchedulerTaskHandler {
    async fn run(&self, window: ExecutionWindow) {
        match self.scheduler.upgrade() {
            Some(scheduler) => {
                scheduler.on_window_granted(window).await;
            }
            None => debug!(task_id = %window.task_id, "Scheduler dropped, ignoring window"),
        }
    }

    fn expire(&self, task_id: &TaskId) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            debug!(task_id = %task_id, "Window expired");
            scheduler.on_window_expired();
        }
    }
}

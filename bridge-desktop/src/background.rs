//! Background Task Execution Implementation
//!
//! Emulates an OS background scheduler with tokio timers: a request waits
//! out its `earliest_begin` delay and its constraints, then the registered
//! handler runs inside a window with a fixed budget. When the budget runs
//! out the handler's `expire` is called and the run is given time to wind
//! down; it is never aborted.

use async_trait::async_trait;
use bridge_traits::{
    background::{
        BackgroundExecutor, BackgroundTaskHandler, ExecutionWindow, TaskConstraints, TaskId,
        TaskStatus,
    },
    error::{BridgeError, Result},
    network::{NetworkInfo, NetworkMonitor, NetworkStatus},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Budget granted to each window unless configured otherwise.
pub const DEFAULT_WINDOW_BUDGET: Duration = Duration::from_secs(300);

const CONSTRAINT_POLL_INTERVAL: Duration = Duration::from_secs(5);

type Tasks = Arc<RwLock<HashMap<TaskId, TaskInfo>>>;

/// Tokio-based background executor for desktop.
pub struct TokioBackgroundExecutor {
    tasks: Tasks,
    handlers: RwLock<HashMap<String, Arc<dyn BackgroundTaskHandler>>>,
    network_monitor: Arc<dyn NetworkMonitor>,
    window_budget: Duration,
    generation: AtomicU64,
}

struct TaskInfo {
    status: TaskStatus,
    handle: Option<JoinHandle<()>>,
    /// Distinguishes a replacement request from the one it replaced
    generation: u64,
}

impl TokioBackgroundExecutor {
    pub fn new(network_monitor: Arc<dyn NetworkMonitor>) -> Self {
        Self::with_window_budget(network_monitor, DEFAULT_WINDOW_BUDGET)
    }

    pub fn with_window_budget(network_monitor: Arc<dyn NetworkMonitor>, window_budget: Duration) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            handlers: RwLock::new(HashMap::new()),
            network_monitor,
            window_budget,
            generation: AtomicU64::new(0),
        }
    }

    pub fn window_budget(&self) -> Duration {
        self.window_budget
    }

    async fn handler_for(&self, task_id: &str) -> Option<Arc<dyn BackgroundTaskHandler>> {
        self.handlers.read().await.get(task_id).cloned()
    }

    async fn constraints_satisfied(monitor: &dyn NetworkMonitor, constraints: &TaskConstraints) -> bool {
        if !(constraints.requires_network || constraints.requires_unmetered) {
            return true;
        }

        match monitor.get_network_info().await {
            Ok(NetworkInfo {
                status: NetworkStatus::Connected,
                is_metered,
                ..
            }) => !(constraints.requires_unmetered && is_metered),
            Ok(_) => false,
            Err(err) => {
                warn!(error = %err, "Network monitor error");
                false
            }
        }
    }

    /// Update the entry only if it still belongs to `generation`.
    async fn set_status(tasks: &Tasks, id: &TaskId, generation: u64, status: TaskStatus) {
        let mut tasks = tasks.write().await;
        if let Some(info) = tasks.get_mut(id) {
            if info.generation == generation {
                info.status = status;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_window(
        tasks: Tasks,
        id: TaskId,
        generation: u64,
        handler: Arc<dyn BackgroundTaskHandler>,
        delay: Duration,
        constraints: TaskConstraints,
        monitor: Arc<dyn NetworkMonitor>,
        budget: Duration,
    ) {
        sleep(delay).await;

        while !Self::constraints_satisfied(monitor.as_ref(), &constraints).await {
            debug!(task_id = %id, "Constraints not satisfied; deferring window");
            sleep(CONSTRAINT_POLL_INTERVAL).await;
        }

        Self::set_status(&tasks, &id, generation, TaskStatus::Running).await;
        info!(task_id = %id, budget_secs = budget.as_secs(), "Execution window granted");

        let run = handler.run(ExecutionWindow::new(id.clone(), budget));
        tokio::pin!(run);

        let status = tokio::select! {
            _ = &mut run => TaskStatus::Completed,
            _ = sleep(budget) => {
                info!(task_id = %id, "Execution window expired");
                handler.expire(&id);
                run.await;
                TaskStatus::Expired
            }
        };

        Self::set_status(&tasks, &id, generation, status).await;
    }
}

#[async_trait]
impl BackgroundExecutor for TokioBackgroundExecutor {
    async fn register_handler(
        &self,
        task_id: &str,
        handler: Arc<dyn BackgroundTaskHandler>,
    ) -> Result<()> {
        self.handlers
            .write()
            .await
            .insert(task_id.to_string(), handler);
        debug!(task_id, "Registered background task handler");
        Ok(())
    }

    async fn schedule_once(
        &self,
        task_id: &str,
        earliest_begin: Duration,
        constraints: TaskConstraints,
    ) -> Result<TaskId> {
        let id = TaskId::new(task_id);
        let handler = self.handler_for(task_id).await.ok_or_else(|| {
            BridgeError::OperationFailed(format!("No handler registered for task: {}", task_id))
        })?;
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        debug!(
            task_id,
            delay_secs = earliest_begin.as_secs(),
            "Scheduling one-time window"
        );

        // Hold the lock across spawn so the new task cannot update its entry
        // before the entry exists.
        let mut tasks = self.tasks.write().await;

        // A pending request is replaced; a running window is left to finish
        // since the request may come from inside it.
        if let Some(previous) = tasks.remove(&id) {
            if previous.status == TaskStatus::Scheduled {
                if let Some(handle) = previous.handle {
                    handle.abort();
                }
            }
        }

        let handle = tokio::spawn(Self::run_window(
            Arc::clone(&self.tasks),
            id.clone(),
            generation,
            handler,
            earliest_begin,
            constraints,
            Arc::clone(&self.network_monitor),
            self.window_budget,
        ));

        tasks.insert(
            id.clone(),
            TaskInfo {
                status: TaskStatus::Scheduled,
                handle: Some(handle),
                generation,
            },
        );

        Ok(id)
    }

    async fn cancel_task(&self, task_id: &TaskId) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let info = tasks
            .get_mut(task_id)
            .ok_or_else(|| BridgeError::OperationFailed(format!("Task not found: {}", task_id)))?;

        if info.status == TaskStatus::Scheduled {
            if let Some(handle) = info.handle.take() {
                handle.abort();
            }
            info.status = TaskStatus::Cancelled;
            debug!(task_id = %task_id, "Cancelled pending window request");
        }
        Ok(())
    }

    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .map(|info| info.status)
            .ok_or_else(|| BridgeError::OperationFailed(format!("Task not found: {}", task_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        runs: AtomicUsize,
        expired: AtomicBool,
        budgets: Mutex<Vec<Duration>>,
        run_for: Duration,
    }

    #[async_trait]
    impl BackgroundTaskHandler for RecordingHandler {
        async fn run(&self, window: ExecutionWindow) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.budgets.lock().unwrap().push(window.budget);

            // Stop early once expired, like a cooperative sync run.
            let mut remaining = self.run_for;
            while !remaining.is_zero() && !self.expired.load(Ordering::SeqCst) {
                let step = remaining.min(Duration::from_secs(1));
                sleep(step).await;
                remaining -= step;
            }
        }

        fn expire(&self, _task_id: &TaskId) {
            self.expired.store(true, Ordering::SeqCst);
        }
    }

    struct SwitchMonitor {
        connected: AtomicBool,
    }

    #[async_trait]
    impl NetworkMonitor for SwitchMonitor {
        async fn get_network_info(&self) -> Result<NetworkInfo> {
            Ok(if self.connected.load(Ordering::SeqCst) {
                NetworkInfo::connected(bridge_traits::network::NetworkType::WiFi)
            } else {
                NetworkInfo::disconnected()
            })
        }
    }

    fn monitor(connected: bool) -> Arc<SwitchMonitor> {
        Arc::new(SwitchMonitor {
            connected: AtomicBool::new(connected),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_granted_after_delay() {
        let executor = TokioBackgroundExecutor::with_window_budget(monitor(true), Duration::from_secs(30));
        let handler = Arc::new(RecordingHandler::default());
        executor.register_handler("sync", handler.clone()).await.unwrap();

        let id = executor
            .schedule_once("sync", Duration::from_secs(120), TaskConstraints::default())
            .await
            .unwrap();

        sleep(Duration::from_secs(119)).await;
        assert_eq!(handler.runs.load(Ordering::SeqCst), 0);
        assert_eq!(executor.get_task_status(&id).await.unwrap(), TaskStatus::Scheduled);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);
        assert_eq!(*handler.budgets.lock().unwrap(), vec![Duration::from_secs(30)]);
        assert_eq!(executor.get_task_status(&id).await.unwrap(), TaskStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_calls_expire() {
        let executor = TokioBackgroundExecutor::with_window_budget(monitor(true), Duration::from_secs(10));
        let handler = Arc::new(RecordingHandler {
            run_for: Duration::from_secs(60),
            ..Default::default()
        });
        executor.register_handler("sync", handler.clone()).await.unwrap();

        let id = executor
            .schedule_once("sync", Duration::ZERO, TaskConstraints::default())
            .await
            .unwrap();

        sleep(Duration::from_secs(5)).await;
        assert_eq!(executor.get_task_status(&id).await.unwrap(), TaskStatus::Running);

        sleep(Duration::from_secs(10)).await;
        assert!(handler.expired.load(Ordering::SeqCst));
        assert_eq!(executor.get_task_status(&id).await.unwrap(), TaskStatus::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_constraint_defers_window() {
        let network = monitor(false);
        let executor = TokioBackgroundExecutor::new(network.clone());
        let handler = Arc::new(RecordingHandler::default());
        executor.register_handler("sync", handler.clone()).await.unwrap();

        executor
            .schedule_once("sync", Duration::from_secs(1), TaskConstraints::default())
            .await
            .unwrap();

        sleep(Duration::from_secs(30)).await;
        assert_eq!(handler.runs.load(Ordering::SeqCst), 0);

        network.connected.store(true, Ordering::SeqCst);
        sleep(Duration::from_secs(10)).await;
        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending_request() {
        let executor = TokioBackgroundExecutor::new(monitor(true));
        let handler = Arc::new(RecordingHandler::default());
        executor.register_handler("sync", handler.clone()).await.unwrap();

        let id = executor
            .schedule_once("sync", Duration::from_secs(60), TaskConstraints::default())
            .await
            .unwrap();
        executor.cancel_task(&id).await.unwrap();

        sleep(Duration::from_secs(120)).await;
        assert_eq!(handler.runs.load(Ordering::SeqCst), 0);
        assert_eq!(executor.get_task_status(&id).await.unwrap(), TaskStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_request_replaces_pending_one() {
        let executor = TokioBackgroundExecutor::new(monitor(true));
        let handler = Arc::new(RecordingHandler::default());
        executor.register_handler("sync", handler.clone()).await.unwrap();

        executor
            .schedule_once("sync", Duration::from_secs(60), TaskConstraints::default())
            .await
            .unwrap();
        executor
            .schedule_once("sync", Duration::from_secs(120), TaskConstraints::default())
            .await
            .unwrap();

        sleep(Duration::from_secs(90)).await;
        assert_eq!(handler.runs.load(Ordering::SeqCst), 0);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(handler.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_schedule_without_handler_fails() {
        let executor = TokioBackgroundExecutor::new(monitor(true));

        let result = executor
            .schedule_once("unknown", Duration::ZERO, TaskConstraints::default())
            .await;

        assert!(result.is_err());
    }
}

//! Background Execution and Lifecycle
//!
//! The host OS decides when background work may run. The core asks for a
//! window with [`BackgroundExecutor::schedule_once`]; when the OS grants it,
//! the registered [`BackgroundTaskHandler`] runs inside the window's budget,
//! and if the OS revokes the window early the handler's `expire` is invoked.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Conditions the OS must satisfy before granting a window
#[derive(Debug, Clone)]
pub struct TaskConstraints {
    /// Require any network connection
    pub requires_network: bool,
    /// Require an unmetered (non-cellular) connection
    pub requires_unmetered: bool,
    /// Require device to be charging
    pub requires_charging: bool,
}

impl Default for TaskConstraints {
    fn default() -> Self {
        Self {
            requires_network: true,
            requires_unmetered: false,
            requires_charging: false,
        }
    }
}

/// Scheduled task identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Requested, waiting for the OS to grant a window
    Scheduled,
    /// Handler is executing inside a granted window
    Running,
    /// Handler returned before the window closed
    Completed,
    /// The OS revoked the window before the handler returned
    Expired,
    /// Request withdrawn by the core
    Cancelled,
}

/// A bounded period granted by the OS for background work.
///
/// The budget is relative to the moment the handler is invoked; consumers
/// compute their own deadline against their clock.
#[derive(Debug, Clone)]
pub struct ExecutionWindow {
    pub task_id: TaskId,
    pub budget: Duration,
}

impl ExecutionWindow {
    pub fn new(task_id: TaskId, budget: Duration) -> Self {
        Self { task_id, budget }
    }
}

/// Work executed inside a granted window
#[async_trait]
pub trait BackgroundTaskHandler: Send + Sync {
    /// Run the task. Returning ends the window early.
    async fn run(&self, window: ExecutionWindow);

    /// Called when the OS is about to revoke the window.
    ///
    /// Must not block: implementations signal their running work and return.
    fn expire(&self, task_id: &TaskId);
}

/// Background task executor trait
///
/// Abstracts platform-specific background task scheduling:
/// - **iOS**: BGTaskScheduler (`BGProcessingTaskRequest`, `earliestBeginDate`)
/// - **Android**: WorkManager one-time work with an initial delay
/// - **Desktop**: tokio timers
///
/// The OS may delay a window arbitrarily past `earliest_begin`, and may
/// decline the request altogether.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::{BackgroundExecutor, TaskConstraints};
/// use std::time::Duration;
///
/// async fn request_window(executor: &dyn BackgroundExecutor) -> Result<()> {
///     executor
///         .schedule_once("photo-sync", Duration::from_secs(120), TaskConstraints::default())
///         .await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait BackgroundExecutor: Send + Sync {
    /// Register the handler invoked when a window for `task_id` is granted.
    async fn register_handler(
        &self,
        task_id: &str,
        handler: Arc<dyn BackgroundTaskHandler>,
    ) -> Result<()>;

    /// Request a one-time window starting no earlier than `earliest_begin`
    /// from now. Replaces any pending request with the same id.
    async fn schedule_once(
        &self,
        task_id: &str,
        earliest_begin: Duration,
        constraints: TaskConstraints,
    ) -> Result<TaskId>;

    /// Withdraw a pending request
    async fn cancel_task(&self, task_id: &TaskId) -> Result<()>;

    /// Get status of a task
    async fn get_task_status(&self, task_id: &TaskId) -> Result<TaskStatus>;

    /// Check if background execution is available
    async fn is_available(&self) -> bool {
        true
    }
}

/// Application lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Foreground and receiving input
    Active,
    /// Foreground but not receiving input (transitioning, overlay shown)
    Inactive,
    /// Not visible; only OS-granted background windows may run
    Background,
}

/// Lifecycle observer trait
///
/// - **iOS**: UIApplication lifecycle notifications / scenePhase
/// - **Android**: ProcessLifecycleOwner
/// - **Desktop**: window focus/minimize events
#[async_trait]
pub trait LifecycleObserver: Send + Sync {
    /// Get current lifecycle state
    async fn get_state(&self) -> Result<LifecycleState>;

    /// Subscribe to lifecycle state changes
    async fn subscribe_changes(&self) -> Result<Box<dyn LifecycleChangeStream>>;
}

/// Stream of lifecycle state changes
#[async_trait]
pub trait LifecycleChangeStream: Send {
    /// Get the next lifecycle state update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<LifecycleState>;
}

//! # Event Bus
//!
//! Broadcast channel carrying sync and scheduler notifications to the host.
//!
//! Background synchronization is fire-and-forget from the UI's perspective;
//! these events exist for telemetry and for hosts that want to show a
//! "last synced" indicator. Emission never fails the operation that emits:
//! callers use `.ok()` because having no subscribers is the normal case.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SchedulerEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Scheduler(SchedulerEvent::Suspended)).ok();
//! assert_eq!(rx.recv().await.unwrap(), CoreEvent::Scheduler(SchedulerEvent::Suspended));
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall further behind receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Sync(SyncEvent),
    Scheduler(SchedulerEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Scheduler(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::RunCompleted { success: false, .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Scheduler(SchedulerEvent::ScheduleFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::RunCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Sync(SyncEvent::RunStarted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events emitted by the synchronization engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A run began; `providers` lists the authenticated providers taking part.
    RunStarted {
        run_id: String,
        providers: Vec<String>,
    },
    /// One photo was confirmed on one provider.
    PhotoSynced {
        run_id: String,
        provider: String,
        photo_id: String,
    },
    /// A provider's portion of the run ended.
    ProviderFinished {
        run_id: String,
        provider: String,
        /// Outcome name (`success`, `skipped`, `quota_exceeded`, ...)
        outcome: String,
        uploaded: u64,
        failed: u64,
    },
    /// The deadline approached and the run's cancellation token was set.
    CancellationRequested { run_id: String },
    /// The run ended; `success` is false for a partial failure.
    RunCompleted {
        run_id: String,
        success: bool,
        duration_ms: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::RunStarted { .. } => "Sync run started",
            SyncEvent::PhotoSynced { .. } => "Photo synced",
            SyncEvent::ProviderFinished { .. } => "Provider finished",
            SyncEvent::CancellationRequested { .. } => "Sync run cancellation requested",
            SyncEvent::RunCompleted { .. } => "Sync run completed",
        }
    }
}

/// Events emitted by the sync scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SchedulerEvent {
    /// A background window was requested from the OS.
    WindowRequested { earliest_begin_secs: u64 },
    /// The OS declined the request; no retry until the next trigger.
    ScheduleFailed { message: String },
    /// A granted window was released without running because syncing is suspended.
    WindowSkipped,
    Suspended,
    Resumed,
}

impl SchedulerEvent {
    fn description(&self) -> &str {
        match self {
            SchedulerEvent::WindowRequested { .. } => "Background window requested",
            SchedulerEvent::ScheduleFailed { .. } => "Background window request failed",
            SchedulerEvent::WindowSkipped => "Background window skipped",
            SchedulerEvent::Suspended => "Sync suspended",
            SchedulerEvent::Resumed => "Sync resumed",
        }
    }
}

/// Broadcast bus shared by every component of the core.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every sender is gone.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_finished(provider: &str) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::ProviderFinished {
            run_id: "run-1".to_string(),
            provider: provider.to_string(),
            outcome: "success".to_string(),
            uploaded: 3,
            failed: 0,
        })
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_an_error() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(provider_finished("dropbox")).is_err());
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let delivered = bus.emit(provider_finished("onedrive")).unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(first.recv().await.unwrap(), provider_finished("onedrive"));
        assert_eq!(second.recv().await.unwrap(), provider_finished("onedrive"));
    }

    #[tokio::test]
    async fn test_filtered_stream_skips_scheduler_events() {
        let bus = EventBus::new(10);
        let mut stream =
            EventStream::new(bus.subscribe()).filter(|event| matches!(event, CoreEvent::Sync(_)));

        bus.emit(CoreEvent::Scheduler(SchedulerEvent::Resumed)).ok();
        bus.emit(provider_finished("google_drive")).ok();

        assert_eq!(stream.recv().await.unwrap(), provider_finished("google_drive"));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_sees_lagged_error() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for _ in 0..5 {
            bus.emit(CoreEvent::Scheduler(SchedulerEvent::Suspended)).ok();
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_severity() {
        let partial = CoreEvent::Sync(SyncEvent::RunCompleted {
            run_id: "r".to_string(),
            success: false,
            duration_ms: 10,
        });
        assert_eq!(partial.severity(), EventSeverity::Warning);

        let ok = CoreEvent::Sync(SyncEvent::RunCompleted {
            run_id: "r".to_string(),
            success: true,
            duration_ms: 10,
        });
        assert_eq!(ok.severity(), EventSeverity::Info);
        assert_eq!(
            CoreEvent::Scheduler(SchedulerEvent::WindowSkipped).severity(),
            EventSeverity::Debug
        );
    }

    #[test]
    fn test_serialization_is_tagged() {
        let json = serde_json::to_value(CoreEvent::Scheduler(SchedulerEvent::WindowRequested {
            earliest_begin_secs: 120,
        }))
        .unwrap();

        assert_eq!(json["type"], "Scheduler");
        assert_eq!(json["payload"]["event"], "WindowRequested");
        assert_eq!(json["payload"]["earliest_begin_secs"], 120);
    }
}

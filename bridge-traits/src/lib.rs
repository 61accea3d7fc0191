//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host platform implements.
//!
//! ## Overview
//!
//! The photo sync core never talks to the OS directly. Networking, credential
//! storage, connectivity checks and background execution windows are reached
//! through the traits in this crate, so the same engine runs inside an iOS
//! `BGProcessingTask`, an Android worker, or a desktop tokio runtime.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations for provider adapters
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity and metered network detection
//!
//! ### Security
//! - [`SecureStore`](storage::SecureStore) - Credential persistence (Keychain/Keystore)
//!
//! ### Platform Integration
//! - [`BackgroundExecutor`](background::BackgroundExecutor) - Requests OS execution windows
//! - [`BackgroundTaskHandler`](background::BackgroundTaskHandler) - Work run inside a window
//! - [`LifecycleObserver`](background::LifecycleObserver) - App active/inactive/background transitions
//!
//! ### Utilities
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Transport
//! failures must be reported as `Network`/`Timeout` so the sync engine can
//! keep a photo pending after an ambiguous upload.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; the engine shares them across
//! one tokio task per provider.

pub mod background;
pub mod error;
pub mod http;
pub mod network;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{
    BackgroundExecutor, BackgroundTaskHandler, ExecutionWindow, LifecycleChangeStream,
    LifecycleObserver, LifecycleState, TaskConstraints, TaskId, TaskStatus,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use storage::SecureStore;
pub use time::{LogEntry, LogLevel, LoggerSink};

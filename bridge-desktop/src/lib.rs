//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` (no retries; rate-limit handling belongs to
//!   the sync engine)
//! - `SecureStore` using the `keyring` crate
//! - `NetworkMonitor` using a TCP reachability probe
//! - `BackgroundExecutor` using tokio timers, with a fixed budget per window
//! - `LifecycleObserver` driven by the host window events
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DesktopNetworkMonitor, ReqwestHttpClient, TokioBackgroundExecutor};
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let monitor = Arc::new(DesktopNetworkMonitor::new());
//! let executor = Arc::new(TokioBackgroundExecutor::new(monitor));
//! ```

mod background;
mod http;
mod lifecycle;
mod network;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use background::TokioBackgroundExecutor;
pub use http::ReqwestHttpClient;
pub use lifecycle::DesktopLifecycleObserver;
pub use network::DesktopNetworkMonitor;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;

//! # Core Configuration Module
//!
//! Builder-based configuration for the photo sync core.
//!
//! ## Overview
//!
//! [`CoreConfig`] carries the host bridges the core needs plus the
//! [`SyncSettings`] tuning the scheduler and engine. The builder fails fast
//! with [`Error::CapabilityMissing`] when a required bridge is absent, so a
//! misconfigured host learns about it at startup rather than on the first
//! background window.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - provider API calls
//! - `SecureStore` - provider credentials
//! - `BackgroundExecutor` - OS execution windows
//!
//! ## Optional Dependencies
//!
//! - `NetworkMonitor` - connectivity gating
//! - `LifecycleObserver` - automatic lifecycle wiring
//!
//! With the `desktop-shims` feature, desktop implementations from
//! `bridge-desktop` are injected for any missing required bridge.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, SyncSettings};
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/photosync.db")
//!     .sync_settings(SyncSettings::default().with_min_run_delay(Duration::from_secs(300)))
//!     .http_client(http)
//!     .secure_store(keychain)
//!     .background_executor(scheduler)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    BackgroundExecutor, HttpClient, LifecycleObserver, NetworkMonitor, SecureStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Identifier under which the sync task is registered with the executor.
pub const DEFAULT_SYNC_TASK_ID: &str = "photo-sync";

/// Timing and naming knobs for the background synchronization subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Task id used when requesting background windows
    pub task_id: String,
    /// Earliest begin of the next window, measured from when it is requested
    pub min_run_delay: Duration,
    /// How long before the deadline the cancellation token is set
    pub cancellation_epsilon: Duration,
    /// Backoff used when a provider rate-limits without a `Retry-After`
    pub default_rate_limit_backoff: Duration,
    /// Upper bound on a provider-specified backoff
    pub max_rate_limit_backoff: Duration,
    /// Per-request timeout handed to provider HTTP calls
    pub request_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            task_id: DEFAULT_SYNC_TASK_ID.to_string(),
            min_run_delay: Duration::from_secs(120),
            cancellation_epsilon: Duration::from_secs(5),
            default_rate_limit_backoff: Duration::from_secs(1),
            max_rate_limit_backoff: Duration::from_secs(60),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl SyncSettings {
    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn with_min_run_delay(mut self, delay: Duration) -> Self {
        self.min_run_delay = delay;
        self
    }

    pub fn with_cancellation_epsilon(mut self, epsilon: Duration) -> Self {
        self.cancellation_epsilon = epsilon;
        self
    }

    pub fn with_rate_limit_backoff(mut self, default: Duration, max: Duration) -> Self {
        self.default_rate_limit_backoff = default;
        self.max_rate_limit_backoff = max;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Clamp a provider-specified backoff, falling back to the default.
    pub fn backoff_for(&self, retry_after: Option<Duration>) -> Duration {
        retry_after
            .unwrap_or(self.default_rate_limit_backoff)
            .min(self.max_rate_limit_backoff)
    }

    pub fn validate(&self) -> Result<()> {
        if self.task_id.trim().is_empty() {
            return Err(Error::Config("Sync task id cannot be empty".to_string()));
        }

        if self.cancellation_epsilon.is_zero() {
            return Err(Error::Config(
                "Cancellation epsilon must be greater than zero so providers \
                 observe the token before the deadline"
                    .to_string(),
            ));
        }

        if self.max_rate_limit_backoff < self.default_rate_limit_backoff {
            return Err(Error::Config(format!(
                "Maximum rate-limit backoff ({:?}) is below the default backoff ({:?})",
                self.max_rate_limit_backoff, self.default_rate_limit_backoff
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Core configuration for the photo sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database holding photos and per-provider status
    pub database_path: PathBuf,

    pub sync: SyncSettings,

    pub http_client: Arc<dyn HttpClient>,

    pub secure_store: Arc<dyn SecureStore>,

    pub background_executor: Arc<dyn BackgroundExecutor>,

    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("sync", &self.sync)
            .field("network_monitor", &self.network_monitor.is_some())
            .field("lifecycle_observer", &self.lifecycle_observer.is_some())
            .finish_non_exhaustive()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        self.sync.validate()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str, mobile: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: enable the 'desktop-shims' feature to use the bridge-desktop default. \
             Mobile: inject {}.",
            capability, purpose, mobile
        ),
    }
}

#[cfg(feature = "desktop-shims")]
mod defaults {
    use super::*;
    use bridge_desktop::{
        DesktopNetworkMonitor, KeyringSecureStore, ReqwestHttpClient, TokioBackgroundExecutor,
    };

    pub fn http_client() -> Result<Arc<dyn HttpClient>> {
        let client = ReqwestHttpClient::new()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Arc::new(client))
    }

    pub fn secure_store() -> Result<Arc<dyn SecureStore>> {
        Ok(Arc::new(KeyringSecureStore::new()))
    }

    pub fn network_monitor() -> Arc<dyn NetworkMonitor> {
        Arc::new(DesktopNetworkMonitor::new())
    }

    pub fn background_executor(
        monitor: Option<Arc<dyn NetworkMonitor>>,
    ) -> Result<Arc<dyn BackgroundExecutor>> {
        let monitor = monitor.unwrap_or_else(network_monitor);
        Ok(Arc::new(TokioBackgroundExecutor::new(monitor)))
    }
}

#[cfg(not(feature = "desktop-shims"))]
mod defaults {
    use super::*;

    pub fn http_client() -> Result<Arc<dyn HttpClient>> {
        Err(capability_missing(
            "HttpClient",
            "provider API calls",
            "a URLSession/OkHttp-backed client",
        ))
    }

    pub fn secure_store() -> Result<Arc<dyn SecureStore>> {
        Err(capability_missing(
            "SecureStore",
            "provider credential persistence",
            "Keychain/Keystore-backed storage",
        ))
    }

    pub fn background_executor(
        _monitor: Option<Arc<dyn NetworkMonitor>>,
    ) -> Result<Arc<dyn BackgroundExecutor>> {
        Err(capability_missing(
            "BackgroundExecutor",
            "background execution windows",
            "a BGTaskScheduler/WorkManager adapter",
        ))
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    sync: Option<SyncSettings>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    background_executor: Option<Arc<dyn BackgroundExecutor>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
}

impl CoreConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn sync_settings(mut self, settings: SyncSettings) -> Self {
        self.sync = Some(settings);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn background_executor(mut self, executor: Arc<dyn BackgroundExecutor>) -> Self {
        self.background_executor = Some(executor);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when the database path is missing or a setting is invalid
    /// - [`Error::CapabilityMissing`] when a required bridge is absent and no
    ///   desktop default is available
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => defaults::http_client()?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => defaults::secure_store()?,
        };

        let background_executor = match self.background_executor {
            Some(executor) => executor,
            None => defaults::background_executor(self.network_monitor.clone())?,
        };

        let config = CoreConfig {
            database_path,
            sync: self.sync.unwrap_or_default(),
            http_client,
            secure_store,
            background_executor,
            network_monitor: self.network_monitor,
            lifecycle_observer: self.lifecycle_observer,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::background::{BackgroundTaskHandler, TaskConstraints, TaskId, TaskStatus};
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpRequest, HttpResponse};

    struct NoopHttpClient;

    #[async_trait]
    impl HttpClient for NoopHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse::new(200, ""))
        }
    }

    struct NoopSecureStore;

    #[async_trait]
    impl SecureStore for NoopSecureStore {
        async fn set_secret(&self, _key: &str, _value: &[u8]) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_secret(&self, _key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn delete_secret(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct NoopExecutor;

    #[async_trait]
    impl BackgroundExecutor for NoopExecutor {
        async fn register_handler(
            &self,
            _task_id: &str,
            _handler: Arc<dyn BackgroundTaskHandler>,
        ) -> BridgeResult<()> {
            Ok(())
        }

        async fn schedule_once(
            &self,
            task_id: &str,
            _earliest_begin: Duration,
            _constraints: TaskConstraints,
        ) -> BridgeResult<TaskId> {
            Ok(TaskId::new(task_id))
        }

        async fn cancel_task(&self, _task_id: &TaskId) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_task_status(&self, _task_id: &TaskId) -> BridgeResult<TaskStatus> {
            Ok(TaskStatus::Scheduled)
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .database_path("/tmp/photosync.db")
            .http_client(Arc::new(NoopHttpClient))
            .secure_store(Arc::new(NoopSecureStore))
            .background_executor(Arc::new(NoopExecutor))
    }

    #[test]
    fn test_sync_settings_defaults() {
        let settings = SyncSettings::default();

        assert_eq!(settings.task_id, "photo-sync");
        assert_eq!(settings.min_run_delay, Duration::from_secs(120));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_backoff_for_clamps_and_defaults() {
        let settings = SyncSettings::default()
            .with_rate_limit_backoff(Duration::from_secs(2), Duration::from_secs(30));

        assert_eq!(settings.backoff_for(None), Duration::from_secs(2));
        assert_eq!(
            settings.backoff_for(Some(Duration::from_secs(10))),
            Duration::from_secs(10)
        );
        assert_eq!(
            settings.backoff_for(Some(Duration::from_secs(600))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_zero_epsilon_is_rejected() {
        let settings = SyncSettings::default().with_cancellation_epsilon(Duration::ZERO);
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_inverted_backoff_bounds_are_rejected() {
        let settings = SyncSettings::default()
            .with_rate_limit_backoff(Duration::from_secs(10), Duration::from_secs(1));
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_with_all_bridges() {
        let config = complete_builder()
            .sync_settings(SyncSettings::default().with_task_id("custom-sync"))
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/photosync.db"));
        assert_eq!(config.sync.task_id, "custom-sync");
        assert!(config.network_monitor.is_none());
    }

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder()
            .http_client(Arc::new(NoopHttpClient))
            .secure_store(Arc::new(NoopSecureStore))
            .background_executor(Arc::new(NoopExecutor))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_executor_fails_fast() {
        let result = CoreConfig::builder()
            .database_path("/tmp/photosync.db")
            .http_client(Arc::new(NoopHttpClient))
            .secure_store(Arc::new(NoopSecureStore))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "BackgroundExecutor")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other.map(|_| ())),
        }
    }
}

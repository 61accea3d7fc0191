//! Core service façade and bootstrap.
//!
//! [`AppContext`] is the single composition root of the photo sync core: it
//! opens the photo catalogue, builds one client per provider on top of the
//! host bridges from [`CoreConfig`], and wires the engine to the background
//! scheduler. Every component is constructed once and shared through `Arc`.
//!
//! Hosts forward app lifecycle transitions with [`AppContext::on_background`],
//! [`AppContext::on_foreground`], [`AppContext::on_inactive`] and
//! [`AppContext::on_active`], or hand a `LifecycleObserver` to the config and
//! call [`AppContext::watch_lifecycle`].
//!
//! Desktop apps typically enable the `desktop-shims` feature (the default),
//! which fills in missing bridges from `bridge-desktop`.

pub mod error;

pub use error::{CoreError, Result};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

use bridge_traits::background::{LifecycleObserver, LifecycleState};
use core_auth::TokenStore;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::SqlitePhotoRepository;
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use core_sync::{RemoteStorageClient, SyncScheduler, SynchronizationEngine};
use provider_dropbox::DropboxConnector;
use provider_google_drive::GoogleDriveConnector;
use provider_onedrive::OneDriveConnector;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

const EVENT_BUS_CAPACITY: usize = 256;

/// Composition root shared by the host app and the background handler.
pub struct AppContext {
    photos: Arc<SqlitePhotoRepository>,
    token_store: TokenStore,
    event_bus: EventBus,
    engine: Arc<SynchronizationEngine>,
    scheduler: Arc<SyncScheduler>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
}

impl AppContext {
    /// Build every component from `config` and register the background task
    /// handler. No window is requested until the first lifecycle trigger.
    #[instrument(skip(config), fields(database = %config.database_path.display()))]
    pub async fn new(config: CoreConfig) -> Result<Self> {
        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
        let photos = Arc::new(SqlitePhotoRepository::new(pool));
        let token_store = TokenStore::new(config.secure_store.clone());
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);

        let engine = Arc::new(SynchronizationEngine::new(
            photos.clone(),
            config.sync.clone(),
            event_bus.clone(),
        ));

        let timeout = config.sync.request_timeout;
        let clients: [Arc<dyn RemoteStorageClient>; 3] = [
            Arc::new(DropboxConnector::new(
                config.http_client.clone(),
                token_store.clone(),
                timeout,
            )),
            Arc::new(OneDriveConnector::new(
                config.http_client.clone(),
                token_store.clone(),
                timeout,
            )),
            Arc::new(GoogleDriveConnector::new(
                config.http_client.clone(),
                token_store.clone(),
                timeout,
            )),
        ];
        for client in clients {
            engine.register_client(client).await;
        }

        let scheduler = Arc::new(SyncScheduler::new(
            engine.clone(),
            config.background_executor.clone(),
            event_bus.clone(),
        ));
        scheduler.register().await?;

        info!(
            providers = ?engine.registered_providers().await,
            task_id = %config.sync.task_id,
            "Photo sync core initialized"
        );

        Ok(Self {
            photos,
            token_store,
            event_bus,
            engine,
            scheduler,
            lifecycle_observer: config.lifecycle_observer,
        })
    }

    /// Photo catalogue: insert captured photos here.
    pub fn photos(&self) -> Arc<SqlitePhotoRepository> {
        Arc::clone(&self.photos)
    }

    /// Provider credentials, written by the host's sign-in flows.
    pub fn token_store(&self) -> &TokenStore {
        &self.token_store
    }

    pub fn engine(&self) -> &Arc<SynchronizationEngine> {
        &self.engine
    }

    pub fn scheduler(&self) -> &Arc<SyncScheduler> {
        &self.scheduler
    }

    /// Subscribe to sync and scheduler events.
    pub fn subscribe_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// App moved to the background: make sure a window is requested.
    pub async fn on_background(&self) -> bool {
        debug!("Lifecycle: background");
        self.scheduler.resume().await
    }

    /// App came to the foreground: hold off new runs.
    pub fn on_foreground(&self) {
        debug!("Lifecycle: foreground");
        self.scheduler.suspend();
    }

    pub fn on_inactive(&self) {
        debug!("Lifecycle: inactive");
        self.scheduler.suspend();
    }

    /// App is active again: lift the suspension and keep the schedule alive.
    pub async fn on_active(&self) -> bool {
        debug!("Lifecycle: active");
        self.scheduler.resume().await
    }

    /// Dispatch a lifecycle state to the matching trigger.
    pub async fn handle_lifecycle(&self, state: LifecycleState) {
        match state {
            LifecycleState::Background => {
                self.on_background().await;
            }
            LifecycleState::Inactive => self.on_inactive(),
            LifecycleState::Active => {
                self.on_active().await;
            }
        }
    }

    /// Forward every change from the configured `LifecycleObserver`.
    ///
    /// Returns `Ok(None)` when no observer was configured. The task ends when
    /// the observer's stream closes.
    pub async fn watch_lifecycle(self: &Arc<Self>) -> Result<Option<JoinHandle<()>>> {
        let Some(observer) = self.lifecycle_observer.clone() else {
            return Ok(None);
        };

        let mut changes = observer.subscribe_changes().await?;
        let context = Arc::downgrade(self);

        Ok(Some(tokio::spawn(async move {
            while let Some(state) = changes.next().await {
                let Some(context) = context.upgrade() else {
                    break;
                };
                context.handle_lifecycle(state).await;
            }
            debug!("Lifecycle stream closed");
        })))
    }
}

//! End-to-end tests: SQLite catalogue, real provider adapters over a fake
//! HTTP bridge, and a hand-driven background executor.

use async_trait::async_trait;
use bridge_traits::background::{
    BackgroundExecutor, BackgroundTaskHandler, ExecutionWindow, LifecycleState, TaskConstraints,
    TaskId, TaskStatus,
};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::SecureStore;
use core_auth::{OAuthTokens, ProviderKind};
use core_library::{Photo, PhotoRepository, SyncState};
use core_runtime::config::CoreConfig;
use core_service::AppContext;
use core_sync::{ProviderOutcome, SchedulerState};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MemorySecureStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.data.lock().unwrap().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.data.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Plays the Dropbox API: the remote folder is missing and every upload
/// succeeds.
#[derive(Default)]
struct DropboxApi {
    uploads: Mutex<Vec<String>>,
}

#[async_trait]
impl HttpClient for DropboxApi {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        if request.url.ends_with("/files/list_folder") {
            return Ok(HttpResponse::new(
                409,
                r#"{"error_summary": "path/not_found/..", "error": {}}"#,
            ));
        }

        if request.url.ends_with("/files/upload") {
            let arg: serde_json::Value = request
                .headers
                .get("Dropbox-API-Arg")
                .and_then(|h| serde_json::from_str(h).ok())
                .unwrap_or_default();
            let path = arg["path"].as_str().unwrap_or_default().to_string();
            let name = path.rsplit('/').next().unwrap_or_default().to_string();
            self.uploads.lock().unwrap().push(path);
            return Ok(HttpResponse::new(
                200,
                serde_json::json!({"id": format!("id:{}", name), "name": name}).to_string(),
            ));
        }

        Ok(HttpResponse::new(500, "unexpected request"))
    }
}

#[derive(Default)]
struct ManualExecutor {
    handler: Mutex<Option<Arc<dyn BackgroundTaskHandler>>>,
    requests: Mutex<Vec<Duration>>,
}

impl ManualExecutor {
    fn handler(&self) -> Arc<dyn BackgroundTaskHandler> {
        self.handler.lock().unwrap().clone().expect("handler registered")
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl BackgroundExecutor for ManualExecutor {
    async fn register_handler(
        &self,
        _task_id: &str,
        handler: Arc<dyn BackgroundTaskHandler>,
    ) -> BridgeResult<()> {
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    async fn schedule_once(
        &self,
        task_id: &str,
        earliest_begin: Duration,
        _constraints: TaskConstraints,
    ) -> BridgeResult<TaskId> {
        self.requests.lock().unwrap().push(earliest_begin);
        Ok(TaskId::new(task_id))
    }

    async fn cancel_task(&self, _task_id: &TaskId) -> BridgeResult<()> {
        Ok(())
    }

    async fn get_task_status(&self, _task_id: &TaskId) -> BridgeResult<TaskStatus> {
        Ok(TaskStatus::Scheduled)
    }
}

struct Harness {
    context: Arc<AppContext>,
    api: Arc<DropboxApi>,
    executor: Arc<ManualExecutor>,
    dir: PathBuf,
}

async fn harness() -> Harness {
    let dir = std::env::temp_dir().join(format!("photosync-e2e-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();

    let api = Arc::new(DropboxApi::default());
    let executor = Arc::new(ManualExecutor::default());

    let config = CoreConfig::builder()
        .database_path(dir.join("photosync.db"))
        .http_client(api.clone())
        .secure_store(Arc::new(MemorySecureStore::default()))
        .background_executor(executor.clone())
        .build()
        .unwrap();

    let context = Arc::new(AppContext::new(config).await.unwrap());
    context
        .token_store()
        .store_tokens(
            ProviderKind::Dropbox,
            &OAuthTokens::new("dbx_token".to_string(), None, Some(3600)),
        )
        .await
        .unwrap();

    Harness {
        context,
        api,
        executor,
        dir,
    }
}

impl Harness {
    async fn capture(&self, name: &str, captured_at: i64) -> Photo {
        let path = self.dir.join(name);
        std::fs::write(&path, b"jpeg-bytes").unwrap();
        let photo = Photo::new(path, captured_at, "Camera Roll", "2024");
        self.context.photos().insert(&photo).await.unwrap()
    }
}

#[tokio::test]
async fn test_background_window_uploads_to_signed_in_provider() {
    let h = harness().await;
    let first = h.capture("IMG_0001.jpg", 1_000).await;
    h.capture("IMG_0002.jpg", 2_000).await;

    assert!(h.context.on_background().await);
    assert_eq!(h.context.scheduler().state(), SchedulerState::Scheduled);

    h.executor
        .handler()
        .run(ExecutionWindow::new(TaskId::new("photo-sync"), Duration::from_secs(60)))
        .await;

    assert_eq!(
        *h.api.uploads.lock().unwrap(),
        vec![
            "/Camera Roll/2024/IMG_0001.jpg".to_string(),
            "/Camera Roll/2024/IMG_0002.jpg".to_string(),
        ]
    );

    let photos = h.context.photos();
    assert_eq!(photos.count_pending(ProviderKind::Dropbox).await.unwrap(), 0);
    assert_eq!(photos.count_pending(ProviderKind::OneDrive).await.unwrap(), 2);

    let stored = photos.find_by_id(&first.id).await.unwrap().unwrap();
    assert_eq!(stored.status(ProviderKind::Dropbox), SyncState::Synced);
    assert_eq!(stored.status(ProviderKind::GoogleDrive), SyncState::Pending);

    let result = h.context.scheduler().last_result().unwrap();
    assert_eq!(result.outcome(ProviderKind::Dropbox), Some(&ProviderOutcome::Success));
    assert_eq!(result.outcome(ProviderKind::OneDrive), Some(&ProviderOutcome::Skipped));
    assert!(result.is_success());

    // The recurring schedule asked for the next window.
    assert_eq!(h.executor.request_count(), 2);
}

#[tokio::test]
async fn test_foreground_suspends_until_active() {
    let h = harness().await;
    h.capture("IMG_0001.jpg", 1_000).await;

    h.context.on_background().await;
    h.context.on_foreground();
    assert!(h.context.scheduler().is_suspended());

    h.executor
        .handler()
        .run(ExecutionWindow::new(TaskId::new("photo-sync"), Duration::from_secs(60)))
        .await;
    assert!(h.api.uploads.lock().unwrap().is_empty());
    assert_eq!(h.context.scheduler().state(), SchedulerState::Idle);

    h.context.handle_lifecycle(LifecycleState::Active).await;
    assert!(!h.context.scheduler().is_suspended());
    assert_eq!(h.context.scheduler().state(), SchedulerState::Scheduled);
}

#[tokio::test]
async fn test_watch_lifecycle_without_observer() {
    let h = harness().await;
    assert!(h.context.watch_lifecycle().await.unwrap().is_none());
}

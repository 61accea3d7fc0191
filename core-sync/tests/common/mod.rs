//! Shared fakes for the engine and scheduler integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use core_auth::ProviderKind;
use core_library::{LibraryError, Photo, PhotoId, PhotoSource, SyncState};
use core_sync::{CancellationToken, RemoteError, RemoteReceipt, RemoteStorageClient};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Photo source
// ============================================================================

/// In-memory catalogue with the same never-revert rule as the SQLite one.
#[derive(Default)]
pub struct MemoryPhotoSource {
    photos: Mutex<Vec<Photo>>,
}

impl MemoryPhotoSource {
    pub fn with_photos(photos: Vec<Photo>) -> Self {
        Self {
            photos: Mutex::new(photos),
        }
    }

    pub fn add(&self, photo: Photo) {
        self.photos.lock().unwrap().push(photo);
    }

    pub fn status(&self, id: &PhotoId, provider: ProviderKind) -> SyncState {
        self.photos
            .lock()
            .unwrap()
            .iter()
            .find(|photo| &photo.id == id)
            .map(|photo| photo.status(provider))
            .unwrap_or(SyncState::Pending)
    }

    /// Names of photos not yet synced to `provider`, oldest first.
    pub fn pending_names(&self, provider: ProviderKind) -> Vec<String> {
        let mut photos: Vec<Photo> = self
            .photos
            .lock()
            .unwrap()
            .iter()
            .filter(|photo| !photo.is_synced_on(provider))
            .cloned()
            .collect();
        photos.sort_by_key(|photo| photo.captured_at);
        photos.into_iter().map(|photo| photo.file_name).collect()
    }

    fn set(&self, id: &PhotoId, provider: ProviderKind, state: SyncState) {
        let mut photos = self.photos.lock().unwrap();
        if let Some(photo) = photos.iter_mut().find(|photo| &photo.id == id) {
            if !photo.is_synced_on(provider) {
                photo.sync_status.insert(provider, state);
            }
        }
    }
}

#[async_trait]
impl PhotoSource for MemoryPhotoSource {
    async fn list_pending(&self, provider: ProviderKind) -> Result<Vec<Photo>, LibraryError> {
        let mut pending: Vec<Photo> = self
            .photos
            .lock()
            .unwrap()
            .iter()
            .filter(|photo| !photo.is_synced_on(provider))
            .cloned()
            .collect();
        pending.sort_by_key(|photo| (photo.captured_at, photo.id));
        Ok(pending)
    }

    async fn mark_uploading(&self, id: &PhotoId, provider: ProviderKind) -> Result<(), LibraryError> {
        self.set(id, provider, SyncState::Uploading);
        Ok(())
    }

    async fn mark_synced(
        &self,
        id: &PhotoId,
        provider: ProviderKind,
        _remote_id: Option<&str>,
    ) -> Result<(), LibraryError> {
        let mut photos = self.photos.lock().unwrap();
        if let Some(photo) = photos.iter_mut().find(|photo| &photo.id == id) {
            photo.sync_status.insert(provider, SyncState::Synced);
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: &PhotoId,
        provider: ProviderKind,
        reason: &str,
    ) -> Result<(), LibraryError> {
        self.set(id, provider, SyncState::Failed(reason.to_string()));
        Ok(())
    }

    async fn mark_pending(&self, id: &PhotoId, provider: ProviderKind) -> Result<(), LibraryError> {
        self.set(id, provider, SyncState::Pending);
        Ok(())
    }
}

pub fn photo(name: &str, captured_at: i64) -> Photo {
    Photo::new(format!("/data/camera/{}", name), captured_at, "Camera Roll", "2024")
}

// ============================================================================
// Remote storage client
// ============================================================================

/// Scripted client. Upload calls consume `script` in order; an empty script
/// means success.
pub struct FakeClient {
    provider: ProviderKind,
    authenticated: bool,
    remote: Mutex<HashMap<(String, String), HashSet<String>>>,
    script: Mutex<VecDeque<Result<(), RemoteError>>>,
    list_error: Mutex<Option<RemoteError>>,
    transfers: Mutex<Vec<String>>,
    upload_delay: Duration,
}

impl FakeClient {
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            authenticated: true,
            remote: Mutex::new(HashMap::new()),
            script: Mutex::new(VecDeque::new()),
            list_error: Mutex::new(None),
            transfers: Mutex::new(Vec::new()),
            upload_delay: Duration::ZERO,
        }
    }

    pub fn signed_out(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn with_script(self, script: Vec<Result<(), RemoteError>>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    pub fn with_list_error(self, error: RemoteError) -> Self {
        *self.list_error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    pub fn with_remote_file(self, album: &str, folder: &str, name: &str) -> Self {
        self.remote
            .lock()
            .unwrap()
            .entry((album.to_string(), folder.to_string()))
            .or_default()
            .insert(name.to_string());
        self
    }

    /// File names whose transfer started, in order.
    pub fn transfers(&self) -> Vec<String> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStorageClient for FakeClient {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn list_remote_folder(
        &self,
        album: &str,
        folder: &str,
    ) -> Result<HashSet<String>, RemoteError> {
        if let Some(error) = self.list_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self
            .remote
            .lock()
            .unwrap()
            .get(&(album.to_string(), folder.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn upload(
        &self,
        photo: &Photo,
        album: &str,
        folder: &str,
        token: &CancellationToken,
    ) -> Result<RemoteReceipt, RemoteError> {
        if token.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }

        self.transfers.lock().unwrap().push(photo.file_name.clone());
        let scripted = self.script.lock().unwrap().pop_front().unwrap_or(Ok(()));

        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }

        scripted?;
        self.remote
            .lock()
            .unwrap()
            .entry((album.to_string(), folder.to_string()))
            .or_default()
            .insert(photo.file_name.clone());
        Ok(RemoteReceipt::new(format!("{}:{}", self.provider.as_str(), photo.file_name)))
    }
}

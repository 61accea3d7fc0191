//! Domain models for the photo library

use bytes::Bytes;
use core_auth::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{LibraryError, Result};

/// Stable, locally unique photo identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhotoId(pub Uuid);

impl PhotoId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PhotoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-provider synchronization state of one photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SyncState {
    Pending,
    /// An upload was started; treated as pending if the run never confirmed it
    Uploading,
    Synced,
    Failed(String),
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Pending => "pending",
            SyncState::Uploading => "uploading",
            SyncState::Synced => "synced",
            SyncState::Failed(_) => "failed",
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, SyncState::Synced)
    }

    /// Rebuild a state from its stored columns.
    pub fn from_parts(state: &str, reason: Option<String>) -> Result<Self> {
        match state {
            "pending" => Ok(SyncState::Pending),
            "uploading" => Ok(SyncState::Uploading),
            "synced" => Ok(SyncState::Synced),
            "failed" => Ok(SyncState::Failed(reason.unwrap_or_default())),
            other => Err(LibraryError::InvalidInput {
                field: "state".to_string(),
                message: format!("unknown sync state '{}'", other),
            }),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SyncState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Handle to a photo's binary content on local storage.
///
/// The bytes are read only when an upload actually starts, so listing a large
/// pending set stays cheap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHandle {
    path: PathBuf,
}

impl ContentHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full content.
    pub async fn load(&self) -> Result<Bytes> {
        tokio::fs::read(&self.path)
            .await
            .map(Bytes::from)
            .map_err(|source| LibraryError::ContentUnavailable {
                path: self.path.display().to_string(),
                source,
            })
    }
}

/// A locally captured photo and its per-provider sync status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    /// Name used for the remote object; also the duplicate-detection key
    pub file_name: String,
    pub mime_type: String,
    pub content: ContentHandle,
    /// Capture time, Unix milliseconds
    pub captured_at: i64,
    pub album: String,
    pub folder: String,
    /// Missing entries are pending
    pub sync_status: BTreeMap<ProviderKind, SyncState>,
}

impl Photo {
    /// New photo with no sync history. The file name and MIME type come from
    /// `content_path`.
    pub fn new(
        content_path: impl Into<PathBuf>,
        captured_at: i64,
        album: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        let path: PathBuf = content_path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_type_for(&file_name).to_string();

        Self {
            id: PhotoId::new(),
            file_name,
            mime_type,
            content: ContentHandle::new(path),
            captured_at,
            album: album.into(),
            folder: folder.into(),
            sync_status: BTreeMap::new(),
        }
    }

    /// Status for one provider.
    pub fn status(&self, provider: ProviderKind) -> SyncState {
        self.sync_status
            .get(&provider)
            .cloned()
            .unwrap_or(SyncState::Pending)
    }

    pub fn is_synced_on(&self, provider: ProviderKind) -> bool {
        self.status(provider).is_synced()
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.file_name.trim().is_empty() {
            return Err("Photo file name cannot be empty".to_string());
        }
        if self.file_name.contains(['/', '\\']) {
            return Err(format!(
                "Photo file name '{}' must not contain path separators",
                self.file_name
            ));
        }
        if self.album.trim().is_empty() || self.folder.trim().is_empty() {
            return Err("Photo album and folder are required".to_string());
        }
        if self.captured_at < 0 {
            return Err("Capture timestamp cannot be negative".to_string());
        }
        Ok(())
    }
}

impl FromStr for PhotoId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

fn mime_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "png" => "image/png",
        "dng" => "image/x-adobe-dng",
        _ => "application/octet-stream",
    }
}

//! Google Drive remote storage client
//!
//! Implements `RemoteStorageClient` for Google Drive API v3.
//!
//! Drive has no path addressing: `album/folder` is resolved to folder ids
//! with `files.list` name queries, starting from `root`. Resolved ids are
//! cached for the lifetime of the connector. Missing folders are created on
//! upload and reported as empty on listing.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::{BufMut, Bytes, BytesMut};
use core_auth::{ProviderKind, TokenStore};
use core_library::Photo;
use core_sync::{CancellationToken, RemoteError, RemoteReceipt, RemoteStorageClient};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{GoogleDriveError, Result};
use crate::types::{CreateFileRequest, DriveFile, FilesListResponse, FOLDER_MIME_TYPE};

const API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";
const ROOT_FOLDER_ID: &str = "root";
const PAGE_SIZE: u32 = 1000;
const MULTIPART_BOUNDARY: &str = "photosync_multipart_boundary";

/// Google Drive connector
///
/// Credentials come from the shared [`TokenStore`]; a missing or expired
/// token surfaces as [`RemoteError::Auth`] before any request is sent.
pub struct GoogleDriveConnector {
    http_client: Arc<dyn HttpClient>,
    tokens: TokenStore,
    request_timeout: Duration,
    /// `album` or `album/folder` -> folder id
    folder_ids: Mutex<HashMap<String, String>>,
}

impl GoogleDriveConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, tokens: TokenStore, request_timeout: Duration) -> Self {
        Self {
            http_client,
            tokens,
            request_timeout,
            folder_ids: Mutex::new(HashMap::new()),
        }
    }

    async fn access_token(&self) -> Result<String> {
        match self.tokens.access_token(ProviderKind::GoogleDrive).await {
            Ok(Some(token)) => Ok(token),
            Ok(None) => Err(GoogleDriveError::AuthenticationFailed(
                "not signed in".to_string(),
            )),
            Err(e) => Err(GoogleDriveError::AuthenticationFailed(e.to_string())),
        }
    }

    /// Send an authorized request and classify non-success responses.
    async fn send(&self, request: HttpRequest, access_token: &str) -> Result<HttpResponse> {
        let request = request
            .bearer_token(access_token)
            .timeout(self.request_timeout);

        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            let error = GoogleDriveError::from_response(&response);
            warn!(status = response.status, error = %error, "Google Drive request failed");
            Err(error)
        }
    }

    fn cached_folder(&self, key: &str) -> Option<String> {
        self.folder_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn cache_folder(&self, key: String, id: String) {
        self.folder_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, id);
    }

    /// Find a child folder of `parent_id` by exact name.
    async fn find_folder(&self, name: &str, parent_id: &str, access_token: &str) -> Result<Option<String>> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and '{}' in parents and trashed = false",
            escape_query(name),
            FOLDER_MIME_TYPE,
            escape_query(parent_id)
        );
        let url = format!(
            "{}/files?q={}&fields={}&pageSize=1",
            API_BASE_URL,
            urlencoding::encode(&query),
            urlencoding::encode("files(id,name)")
        );

        let response = self
            .send(HttpRequest::new(HttpMethod::Get, url), access_token)
            .await?;
        let list: FilesListResponse = parse_json(&response)?;
        Ok(list.files.into_iter().next().map(|file| file.id))
    }

    async fn create_folder(&self, name: &str, parent_id: &str, access_token: &str) -> Result<String> {
        let metadata = CreateFileRequest {
            name,
            mime_type: FOLDER_MIME_TYPE,
            parents: vec![parent_id],
        };
        let request = HttpRequest::new(HttpMethod::Post, format!("{}/files?fields=id", API_BASE_URL))
            .json(&metadata)?;

        let response = self.send(request, access_token).await?;
        let created: DriveFile = parse_json(&response)?;
        info!(name, folder_id = %created.id, "Created Google Drive folder");
        Ok(created.id)
    }

    /// Resolve `album/folder` to a folder id, optionally creating the missing
    /// levels. `Ok(None)` means the path does not exist and `create` is false.
    async fn resolve_folder(
        &self,
        album: &str,
        folder: &str,
        create: bool,
        access_token: &str,
    ) -> Result<Option<String>> {
        let mut parent_id = ROOT_FOLDER_ID.to_string();
        let mut key = String::new();

        for segment in [album, folder] {
            if !key.is_empty() {
                key.push('/');
            }
            key.push_str(segment);

            if let Some(id) = self.cached_folder(&key) {
                parent_id = id;
                continue;
            }

            let id = match self.find_folder(segment, &parent_id, access_token).await? {
                Some(id) => id,
                None if create => self.create_folder(segment, &parent_id, access_token).await?,
                None => return Ok(None),
            };
            self.cache_folder(key.clone(), id.clone());
            parent_id = id;
        }

        Ok(Some(parent_id))
    }

    async fn list_children(&self, folder_id: &str, access_token: &str) -> Result<HashSet<String>> {
        let query = format!("'{}' in parents and trashed = false", escape_query(folder_id));
        let mut names = HashSet::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/files?q={}&fields={}&pageSize={}",
                API_BASE_URL,
                urlencoding::encode(&query),
                urlencoding::encode("nextPageToken,files(id,name)"),
                PAGE_SIZE
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let response = self
                .send(HttpRequest::new(HttpMethod::Get, url), access_token)
                .await?;
            let page: FilesListResponse = parse_json(&response)?;
            names.extend(page.files.into_iter().map(|file| file.name));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(names)
    }

    async fn upload_file(&self, photo: &Photo, folder_id: &str, access_token: &str) -> Result<String> {
        let content = photo
            .content
            .load()
            .await
            .map_err(|e| GoogleDriveError::ContentUnavailable(e.to_string()))?;

        let metadata = CreateFileRequest {
            name: &photo.file_name,
            mime_type: &photo.mime_type,
            parents: vec![folder_id],
        };
        let metadata = serde_json::to_vec(&metadata)
            .map_err(|e| GoogleDriveError::ParseError(e.to_string()))?;
        let body = multipart_body(&metadata, &photo.mime_type, &content);

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/files?uploadType=multipart&fields=id", UPLOAD_BASE_URL),
        )
        .body(
            body,
            format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
        );

        let response = self.send(request, access_token).await?;
        let created: DriveFile = parse_json(&response)?;
        Ok(created.id)
    }
}

#[async_trait]
impl RemoteStorageClient for GoogleDriveConnector {
    fn provider(&self) -> ProviderKind {
        ProviderKind::GoogleDrive
    }

    async fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated(ProviderKind::GoogleDrive).await
    }

    #[instrument(skip(self))]
    async fn list_remote_folder(
        &self,
        album: &str,
        folder: &str,
    ) -> std::result::Result<HashSet<String>, RemoteError> {
        let access_token = self.access_token().await?;

        let Some(folder_id) = self
            .resolve_folder(album, folder, false, &access_token)
            .await?
        else {
            debug!("Remote folder does not exist yet");
            return Ok(HashSet::new());
        };

        let names = self.list_children(&folder_id, &access_token).await?;
        debug!(count = names.len(), "Listed remote folder");
        Ok(names)
    }

    #[instrument(skip(self, photo, token), fields(photo_id = %photo.id, file_name = %photo.file_name))]
    async fn upload(
        &self,
        photo: &Photo,
        album: &str,
        folder: &str,
        token: &CancellationToken,
    ) -> std::result::Result<RemoteReceipt, RemoteError> {
        if token.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }
        let access_token = self.access_token().await?;

        let folder_id = self
            .resolve_folder(album, folder, true, &access_token)
            .await?
            .ok_or_else(|| RemoteError::Other("folder could not be created".to_string()))?;

        if token.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }

        let file_id = self.upload_file(photo, &folder_id, &access_token).await?;
        info!(file_id = %file_id, "Uploaded photo to Google Drive");
        Ok(RemoteReceipt::new(file_id))
    }
}

/// Escape a literal for use inside a single-quoted Drive query string.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn parse_json<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| GoogleDriveError::ParseError(e.to_string()))
}

fn multipart_body(metadata: &[u8], mime_type: &str, content: &[u8]) -> Bytes {
    let mut body = BytesMut::with_capacity(metadata.len() + content.len() + 256);
    body.put_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(metadata);
    body.put_slice(format!("\r\n--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.put_slice(format!("Content-Type: {}\r\n\r\n", mime_type).as_bytes());
    body.put_slice(content);
    body.put_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.freeze()
}

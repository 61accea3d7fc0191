//! Dropbox remote storage client
//!
//! RPC endpoints take JSON bodies on `api.dropboxapi.com`; the upload
//! endpoint on `content.dropboxapi.com` takes the raw bytes as the body and
//! its arguments in the `Dropbox-API-Arg` header.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_auth::{ProviderKind, TokenStore};
use core_library::Photo;
use core_sync::{CancellationToken, RemoteError, RemoteReceipt, RemoteStorageClient};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{DropboxError, Result};
use crate::types::{
    CommitInfo, FileMetadata, ListFolderArg, ListFolderContinueArg, ListFolderResult,
};

const API_BASE_URL: &str = "https://api.dropboxapi.com/2";
const CONTENT_BASE_URL: &str = "https://content.dropboxapi.com/2";
const LIST_LIMIT: u32 = 2000;

pub struct DropboxConnector {
    http_client: Arc<dyn HttpClient>,
    tokens: TokenStore,
    request_timeout: Duration,
}

impl DropboxConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, tokens: TokenStore, request_timeout: Duration) -> Self {
        Self {
            http_client,
            tokens,
            request_timeout,
        }
    }

    async fn access_token(&self) -> Result<String> {
        match self.tokens.access_token(ProviderKind::Dropbox).await {
            Ok(Some(token)) => Ok(token),
            Ok(None) => Err(DropboxError::AuthenticationFailed(
                "not signed in".to_string(),
            )),
            Err(e) => Err(DropboxError::AuthenticationFailed(e.to_string())),
        }
    }

    async fn send(&self, request: HttpRequest, access_token: &str) -> Result<HttpResponse> {
        let request = request
            .bearer_token(access_token)
            .timeout(self.request_timeout);

        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let error = DropboxError::from_response(&response);
        if !matches!(error, DropboxError::PathNotFound(_)) {
            warn!(status = response.status, error = %error, "Dropbox request failed");
        }
        Err(error)
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        arg: &impl serde::Serialize,
        access_token: &str,
    ) -> Result<T> {
        let request =
            HttpRequest::new(HttpMethod::Post, format!("{}/{}", API_BASE_URL, endpoint)).json(arg)?;
        let response = self.send(request, access_token).await?;
        parse_json(&response)
    }

    async fn list_folder(&self, path: &str, access_token: &str) -> Result<HashSet<String>> {
        let mut page: ListFolderResult = self
            .rpc(
                "files/list_folder",
                &ListFolderArg {
                    path,
                    recursive: false,
                    limit: LIST_LIMIT,
                },
                access_token,
            )
            .await?;

        let mut names = HashSet::new();
        loop {
            names.extend(
                page.entries
                    .into_iter()
                    .filter(|entry| entry.is_file())
                    .map(|entry| entry.name),
            );
            if !page.has_more {
                break;
            }
            page = self
                .rpc(
                    "files/list_folder/continue",
                    &ListFolderContinueArg {
                        cursor: &page.cursor,
                    },
                    access_token,
                )
                .await?;
        }

        Ok(names)
    }
}

#[async_trait]
impl RemoteStorageClient for DropboxConnector {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Dropbox
    }

    async fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated(ProviderKind::Dropbox).await
    }

    #[instrument(skip(self))]
    async fn list_remote_folder(
        &self,
        album: &str,
        folder: &str,
    ) -> std::result::Result<HashSet<String>, RemoteError> {
        let access_token = self.access_token().await?;

        match self
            .list_folder(&remote_path(&[album, folder]), &access_token)
            .await
        {
            Ok(names) => {
                debug!(count = names.len(), "Listed remote folder");
                Ok(names)
            }
            Err(DropboxError::PathNotFound(_)) => {
                debug!("Remote folder does not exist yet");
                Ok(HashSet::new())
            }
            Err(e) => Err(e.into()),
        }
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

        let content = photo
            .content
            .load()
            .await
            .map_err(|e| DropboxError::ContentUnavailable(e.to_string()))?;

        let path = remote_path(&[album, folder, &photo.file_name]);
        let arg = CommitInfo {
            path: &path,
            mode: "add",
            autorename: false,
            mute: true,
        };
        let arg = header_safe_json(&arg)?;

        let request = HttpRequest::new(HttpMethod::Post, format!("{}/files/upload", CONTENT_BASE_URL))
            .header("Dropbox-API-Arg", arg)
            .body(content, "application/octet-stream");

        let response = self.send(request, &access_token).await?;
        let metadata: FileMetadata = parse_json(&response)?;

        info!(file_id = %metadata.id, name = %metadata.name, "Uploaded photo to Dropbox");
        Ok(RemoteReceipt::new(metadata.id))
    }
}

/// Absolute Dropbox path. Dropbox paths are not URL-encoded.
fn remote_path(segments: &[&str]) -> String {
    segments.iter().fold(String::new(), |mut path, segment| {
        path.push('/');
        path.push_str(segment);
        path
    })
}

/// JSON for an HTTP header: non-ASCII characters are written as `\uXXXX`.
fn header_safe_json(value: &impl serde::Serialize) -> Result<String> {
    let json = serde_json::to_string(value).map_err(|e| DropboxError::ParseError(e.to_string()))?;

    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(escaped)
}

fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| DropboxError::ParseError(e.to_string()))
}

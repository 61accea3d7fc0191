//! OneDrive remote storage client over Microsoft Graph

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_auth::{ProviderKind, TokenStore};
use core_library::Photo;
use core_sync::{CancellationToken, RemoteError, RemoteReceipt, RemoteStorageClient};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{OneDriveError, Result};
use crate::types::{ChildrenResponse, DriveItem};

const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
const PAGE_SIZE: u32 = 200;

/// OneDrive connector
///
/// Items are addressed by path under the drive root, so no folder ids are
/// resolved. Graph creates missing parent folders on upload.
pub struct OneDriveConnector {
    http_client: Arc<dyn HttpClient>,
    tokens: TokenStore,
    request_timeout: Duration,
}

impl OneDriveConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, tokens: TokenStore, request_timeout: Duration) -> Self {
        Self {
            http_client,
            tokens,
            request_timeout,
        }
    }

    async fn access_token(&self) -> Result<String> {
        match self.tokens.access_token(ProviderKind::OneDrive).await {
            Ok(Some(token)) => Ok(token),
            Ok(None) => Err(OneDriveError::AuthRequired("not signed in".to_string())),
            Err(e) => Err(OneDriveError::AuthRequired(e.to_string())),
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

        let error = OneDriveError::from_response(&response);
        if !matches!(error, OneDriveError::NotFound(_)) {
            warn!(status = response.status, error = %error, "Graph request failed");
        }
        Err(error)
    }

    async fn list_children(&self, album: &str, folder: &str, access_token: &str) -> Result<HashSet<String>> {
        let mut names = HashSet::new();
        let mut next = Some(format!(
            "{}/me/drive/root:/{}:/children?$select=id,name&$top={}",
            GRAPH_BASE_URL,
            item_path(&[album, folder]),
            PAGE_SIZE
        ));

        while let Some(url) = next.take() {
            let response = self
                .send(HttpRequest::new(HttpMethod::Get, url), access_token)
                .await?;
            let page: ChildrenResponse = serde_json::from_slice(&response.body)
                .map_err(|e| OneDriveError::InvalidResponse(e.to_string()))?;

            names.extend(page.value.into_iter().map(|item| item.name));
            next = page.next_link;
        }

        Ok(names)
    }
}

#[async_trait]
impl RemoteStorageClient for OneDriveConnector {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OneDrive
    }

    async fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated(ProviderKind::OneDrive).await
    }

    #[instrument(skip(self))]
    async fn list_remote_folder(
        &self,
        album: &str,
        folder: &str,
    ) -> std::result::Result<HashSet<String>, RemoteError> {
        let access_token = self.access_token().await?;

        match self.list_children(album, folder, &access_token).await {
            Ok(names) => {
                debug!(count = names.len(), "Listed remote folder");
                Ok(names)
            }
            Err(OneDriveError::NotFound(_)) => {
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
            .map_err(|e| OneDriveError::ContentUnavailable(e.to_string()))?;

        let url = format!(
            "{}/me/drive/root:/{}:/content?@microsoft.graph.conflictBehavior=fail",
            GRAPH_BASE_URL,
            item_path(&[album, folder, &photo.file_name])
        );
        let request = HttpRequest::new(HttpMethod::Put, url).body(content, photo.mime_type.clone());

        let response = self.send(request, &access_token).await?;
        let item: DriveItem = serde_json::from_slice(&response.body)
            .map_err(|e| OneDriveError::InvalidResponse(e.to_string()))?;

        info!(item_id = %item.id, "Uploaded photo to OneDrive");
        Ok(RemoteReceipt::new(item.id))
    }
}

/// Percent-encode each path segment and join with `/`.
fn item_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::storage::SecureStore;
    use core_auth::OAuthTokens;
    use mockall::mock;
    use mockall::Sequence;
    use std::collections::HashMap;
    use std::sync::Mutex;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

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

    async fn connector(mock: MockHttpClient) -> OneDriveConnector {
        let tokens = TokenStore::new(Arc::new(MemorySecureStore::default()));
        tokens
            .store_tokens(
                ProviderKind::OneDrive,
                &OAuthTokens::new("graph_token".to_string(), None, Some(3600)),
            )
            .await
            .unwrap();
        OneDriveConnector::new(Arc::new(mock), tokens, Duration::from_secs(30))
    }

    fn temp_photo(name: &str) -> Photo {
        let dir = std::env::temp_dir().join(format!("onedrive-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, b"jpeg-bytes").unwrap();
        Photo::new(path, 1_700_000_000_000, "Camera Roll", "2024")
    }

    #[tokio::test]
    async fn test_listing_follows_next_link() {
        let mut mock = MockHttpClient::new();
        let mut seq = Sequence::new();

        mock.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                req.url.starts_with("https://graph.microsoft.com/v1.0/me/drive/root:/Camera%20Roll/2024:/children")
                    && req.headers.get("Authorization") == Some(&"Bearer graph_token".to_string())
            })
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"value": [{"id": "1", "name": "a.jpg"}],
                        "@odata.nextLink": "https://graph.microsoft.com/v1.0/next-page"}"#,
                ))
            });
        mock.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url == "https://graph.microsoft.com/v1.0/next-page")
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"value": [{"id": "2", "name": "b.jpg"}]}"#,
                ))
            });

        let connector = connector(mock).await;
        let names = connector.list_remote_folder("Camera Roll", "2024").await.unwrap();

        assert_eq!(names.len(), 2);
        assert!(names.contains("a.jpg") && names.contains("b.jpg"));
    }

    #[tokio::test]
    async fn test_missing_folder_lists_empty() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(
                404,
                r#"{"error": {"code": "itemNotFound", "message": "The resource could not be found."}}"#,
            ))
        });

        let connector = connector(mock).await;
        let names = connector.list_remote_folder("Camera Roll", "2024").await.unwrap();

        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_upload_never_overwrites() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .withf(|req| {
                req.method == HttpMethod::Put
                    && req.url.ends_with(
                        "root:/Camera%20Roll/2024/IMG_0001.jpg:/content?@microsoft.graph.conflictBehavior=fail",
                    )
                    && req.headers.get("Content-Type") == Some(&"image/jpeg".to_string())
                    && req.body.as_deref() == Some(&b"jpeg-bytes"[..])
            })
            .returning(|_| Ok(HttpResponse::new(201, r#"{"id": "01ITEM", "name": "IMG_0001.jpg"}"#)));

        let connector = connector(mock).await;
        let receipt = connector
            .upload(&temp_photo("IMG_0001.jpg"), "Camera Roll", "2024", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(receipt.remote_id, "01ITEM");
    }

    #[tokio::test]
    async fn test_throttling_carries_retry_after() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(429, "").with_header("Retry-After", "3")));

        let connector = connector(mock).await;
        let result = connector
            .upload(&temp_photo("IMG_0002.jpg"), "Camera Roll", "2024", &CancellationToken::new())
            .await;

        assert_eq!(
            result.unwrap_err(),
            RemoteError::RateLimited {
                retry_after: Some(Duration::from_secs(3))
            }
        );
    }

    #[tokio::test]
    async fn test_insufficient_storage_is_quota() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(507, "")));

        let connector = connector(mock).await;
        let result = connector
            .upload(&temp_photo("IMG_0003.jpg"), "Camera Roll", "2024", &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(RemoteError::QuotaExceeded(_))));
    }

    #[tokio::test]
    async fn test_unauthorized_listing_is_auth_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(401, "")));

        let connector = connector(mock).await;
        let result = connector.list_remote_folder("Camera Roll", "2024").await;

        assert!(matches!(result, Err(RemoteError::Auth(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let mut mock = MockHttpClient::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::Timeout(Duration::from_secs(30))));

        let connector = connector(mock).await;
        let result = connector
            .upload(&temp_photo("IMG_0004.jpg"), "Camera Roll", "2024", &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(RemoteError::Network(_))));
    }

    #[test]
    fn test_item_path_encodes_segments() {
        assert_eq!(
            item_path(&["Kid's Party", "2024/05", "a b.jpg"]),
            "Kid%27s%20Party/2024%2F05/a%20b.jpg"
        );
    }
}

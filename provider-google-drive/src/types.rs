//! Google Drive API request and response types
//!
//! Data structures for the parts of the Drive v3 API the uploader uses.

use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive API file resource (only the requested fields)
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for next page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Metadata part of a `files.create` request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest<'a> {
    pub name: &'a str,
    pub mime_type: &'a str,
    pub parents: Vec<&'a str>,
}

/// Drive error envelope
///
/// ```json
/// {"error": {"code": 403, "message": "...", "errors": [{"reason": "storageQuotaExceeded"}]}}
/// ```
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub reason: String,
}

impl ApiErrorBody {
    pub fn has_reason(&self, reason: &str) -> bool {
        self.errors.iter().any(|detail| detail.reason == reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_files_list_response() {
        let json = r#"{
            "files": [
                {"id": "1a", "name": "IMG_0001.jpg", "mimeType": "image/jpeg"},
                {"id": "1b", "name": "IMG_0002.jpg"}
            ],
            "nextPageToken": "token123"
        }"#;

        let response: FilesListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.files.len(), 2);
        assert_eq!(response.files[1].mime_type, None);
        assert_eq!(response.next_page_token, Some("token123".to_string()));
    }

    #[test]
    fn test_deserialize_error_reason() {
        let json = r#"{
            "error": {
                "code": 403,
                "message": "The user's Drive storage quota has been exceeded.",
                "errors": [{"domain": "usageLimits", "reason": "storageQuotaExceeded"}]
            }
        }"#;

        let response: ApiErrorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.error.code, 403);
        assert!(response.error.has_reason("storageQuotaExceeded"));
        assert!(!response.error.has_reason("rateLimitExceeded"));
    }

    #[test]
    fn test_serialize_create_request() {
        let request = CreateFileRequest {
            name: "Camera Roll",
            mime_type: FOLDER_MIME_TYPE,
            parents: vec!["root"],
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["mimeType"], FOLDER_MIME_TYPE);
        assert_eq!(json["parents"][0], "root");
    }
}

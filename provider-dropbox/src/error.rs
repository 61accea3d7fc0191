//! Error types for Dropbox provider

use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpResponse;
use core_sync::RemoteError;
use std::time::Duration;
use thiserror::Error;

use crate::types::ApiErrorResponse;

#[derive(Error, Debug)]
pub enum DropboxError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Dropbox API error (status {status_code}): {summary}")]
    ApiError { status_code: u16, summary: String },

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Rate limit exceeded (retry after {retry_after:?})")]
    RateLimitExceeded { retry_after: Option<Duration> },

    #[error("Insufficient space: {0}")]
    InsufficientSpace(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Photo content unavailable: {0}")]
    ContentUnavailable(String),
}

pub type Result<T> = std::result::Result<T, DropboxError>;

impl DropboxError {
    pub fn from_response(response: &HttpResponse) -> Self {
        let parsed = serde_json::from_slice::<ApiErrorResponse>(&response.body).ok();
        let summary = parsed
            .as_ref()
            .map(|body| body.error_summary.clone())
            .unwrap_or_else(|| String::from_utf8_lossy(&response.body).into_owned());
        let has_tag = |tag: &str| parsed.as_ref().is_some_and(|body| body.has_tag(tag));

        match response.status {
            401 => DropboxError::AuthenticationFailed(summary),
            429 => DropboxError::RateLimitExceeded {
                retry_after: response.retry_after(),
            },
            409 if has_tag("not_found") => DropboxError::PathNotFound(summary),
            409 if has_tag("insufficient_space") => DropboxError::InsufficientSpace(summary),
            status if (500..600).contains(&status) => {
                DropboxError::NetworkError(format!("status {}: {}", status, summary))
            }
            status => DropboxError::ApiError {
                status_code: status,
                summary,
            },
        }
    }
}

impl From<BridgeError> for DropboxError {
    fn from(error: BridgeError) -> Self {
        if error.is_transport() {
            DropboxError::NetworkError(error.to_string())
        } else {
            DropboxError::ParseError(error.to_string())
        }
    }
}

impl From<DropboxError> for RemoteError {
    fn from(error: DropboxError) -> Self {
        match error {
            DropboxError::AuthenticationFailed(msg) => RemoteError::Auth(msg),
            DropboxError::RateLimitExceeded { retry_after } => {
                RemoteError::RateLimited { retry_after }
            }
            DropboxError::InsufficientSpace(msg) => RemoteError::QuotaExceeded(msg),
            DropboxError::NetworkError(msg) => RemoteError::Network(msg),
            other => RemoteError::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conflict(summary: &str) -> HttpResponse {
        HttpResponse::new(
            409,
            format!(r#"{{"error_summary": "{}", "error": {{}}}}"#, summary),
        )
    }

    #[test]
    fn test_conflict_responses_split_by_tag() {
        assert!(matches!(
            DropboxError::from_response(&conflict("path/not_found/..")),
            DropboxError::PathNotFound(_)
        ));
        assert!(matches!(
            DropboxError::from_response(&conflict("path/insufficient_space/.")),
            DropboxError::InsufficientSpace(_)
        ));
        assert!(matches!(
            DropboxError::from_response(&conflict("path/conflict/file/..")),
            DropboxError::ApiError { status_code: 409, .. }
        ));
    }

    #[test]
    fn test_rate_limit_without_header() {
        let error = DropboxError::from_response(&HttpResponse::new(429, "too_many_requests"));

        assert_eq!(
            RemoteError::from(error),
            RemoteError::RateLimited { retry_after: None }
        );
    }

    #[test]
    fn test_server_error_is_network() {
        let error = DropboxError::from_response(&HttpResponse::new(503, ""));
        assert!(matches!(RemoteError::from(error), RemoteError::Network(_)));
    }
}

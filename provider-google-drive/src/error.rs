//! Error types for Google Drive provider

use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpResponse;
use core_sync::RemoteError;
use std::time::Duration;
use thiserror::Error;

use crate::types::ApiErrorResponse;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// No usable token, or the API rejected it
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limit exceeded (retry after {retry_after:?})")]
    RateLimitExceeded { retry_after: Option<Duration> },

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Transport failure or server-side error
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Photo content unavailable: {0}")]
    ContentUnavailable(String),

    #[error("Upload cancelled")]
    Cancelled,
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl GoogleDriveError {
    /// Classify a non-success response.
    pub fn from_response(response: &HttpResponse) -> Self {
        let parsed = serde_json::from_slice::<ApiErrorResponse>(&response.body).ok();
        let message = parsed
            .as_ref()
            .map(|body| body.error.message.clone())
            .unwrap_or_else(|| String::from_utf8_lossy(&response.body).into_owned());
        let has_reason =
            |reason: &str| parsed.as_ref().is_some_and(|body| body.error.has_reason(reason));

        match response.status {
            401 => GoogleDriveError::AuthenticationFailed(message),
            429 => GoogleDriveError::RateLimitExceeded {
                retry_after: response.retry_after(),
            },
            403 if has_reason("rateLimitExceeded") || has_reason("userRateLimitExceeded") => {
                GoogleDriveError::RateLimitExceeded {
                    retry_after: response.retry_after(),
                }
            }
            403 if has_reason("storageQuotaExceeded") => GoogleDriveError::QuotaExceeded(message),
            status if (500..600).contains(&status) => {
                GoogleDriveError::NetworkError(format!("status {}: {}", status, message))
            }
            status => GoogleDriveError::ApiError {
                status_code: status,
                message,
            },
        }
    }
}

impl From<BridgeError> for GoogleDriveError {
    fn from(error: BridgeError) -> Self {
        if error.is_transport() {
            GoogleDriveError::NetworkError(error.to_string())
        } else {
            GoogleDriveError::ApiError {
                status_code: 0,
                message: error.to_string(),
            }
        }
    }
}

impl From<GoogleDriveError> for RemoteError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::AuthenticationFailed(msg) => RemoteError::Auth(msg),
            GoogleDriveError::RateLimitExceeded { retry_after } => {
                RemoteError::RateLimited { retry_after }
            }
            GoogleDriveError::QuotaExceeded(msg) => RemoteError::QuotaExceeded(msg),
            GoogleDriveError::NetworkError(msg) => RemoteError::Network(msg),
            GoogleDriveError::Cancelled => RemoteError::Cancelled,
            other => RemoteError::Other(other.to_string()),
        }
    }
}

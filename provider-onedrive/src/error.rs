use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpResponse;
use core_sync::RemoteError;
use std::time::Duration;
use thiserror::Error;

use crate::types::GraphErrorResponse;

#[derive(Error, Debug)]
pub enum OneDriveError {
    #[error("API request failed (status {status}): {code} {message}")]
    ApiError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Throttled, retry after {0:?}")]
    Throttled(Option<Duration>),

    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Photo content unavailable: {0}")]
    ContentUnavailable(String),
}

pub type Result<T> = std::result::Result<T, OneDriveError>;

impl OneDriveError {
    pub fn from_response(response: &HttpResponse) -> Self {
        let (code, message) = match serde_json::from_slice::<GraphErrorResponse>(&response.body) {
            Ok(parsed) => (parsed.error.code, parsed.error.message),
            Err(_) => (
                String::new(),
                String::from_utf8_lossy(&response.body).into_owned(),
            ),
        };

        match response.status {
            401 => OneDriveError::AuthRequired(message),
            429 | 503 => OneDriveError::Throttled(response.retry_after()),
            507 => OneDriveError::QuotaExceeded(message),
            _ if code == "quotaLimitReached" => OneDriveError::QuotaExceeded(message),
            404 => OneDriveError::NotFound(message),
            status if (500..600).contains(&status) => {
                OneDriveError::Http(format!("status {}: {}", status, message))
            }
            status => OneDriveError::ApiError {
                status,
                code,
                message,
            },
        }
    }
}

impl From<BridgeError> for OneDriveError {
    fn from(error: BridgeError) -> Self {
        if error.is_transport() {
            OneDriveError::Http(error.to_string())
        } else {
            OneDriveError::InvalidResponse(error.to_string())
        }
    }
}

impl From<OneDriveError> for RemoteError {
    fn from(error: OneDriveError) -> Self {
        match error {
            OneDriveError::AuthRequired(msg) => RemoteError::Auth(msg),
            OneDriveError::Throttled(retry_after) => RemoteError::RateLimited { retry_after },
            OneDriveError::QuotaExceeded(msg) => RemoteError::QuotaExceeded(msg),
            OneDriveError::Http(msg) => RemoteError::Network(msg),
            other => RemoteError::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_unavailable_is_throttling() {
        let response = HttpResponse::new(503, "").with_header("Retry-After", "12");

        assert!(matches!(
            OneDriveError::from_response(&response),
            OneDriveError::Throttled(Some(d)) if d == Duration::from_secs(12)
        ));
    }

    #[test]
    fn test_quota_limit_reached_code() {
        let response = HttpResponse::new(
            403,
            r#"{"error": {"code": "quotaLimitReached", "message": "Insufficient Storage"}}"#,
        );

        assert!(matches!(
            OneDriveError::from_response(&response),
            OneDriveError::QuotaExceeded(msg) if msg == "Insufficient Storage"
        ));
        assert!(matches!(
            OneDriveError::from_response(&HttpResponse::new(507, "")),
            OneDriveError::QuotaExceeded(_)
        ));
    }

    #[test]
    fn test_conflict_is_plain_api_error() {
        let response = HttpResponse::new(
            409,
            r#"{"error": {"code": "nameAlreadyExists", "message": "exists"}}"#,
        );

        let error = OneDriveError::from_response(&response);
        assert!(matches!(
            &error,
            OneDriveError::ApiError { status: 409, code, .. } if code == "nameAlreadyExists"
        ));
        assert!(matches!(RemoteError::from(error), RemoteError::Other(_)));
    }

    #[test]
    fn test_gateway_error_is_network() {
        let error = OneDriveError::from_response(&HttpResponse::new(502, "bad gateway"));
        assert!(matches!(RemoteError::from(error), RemoteError::Network(_)));
    }
}

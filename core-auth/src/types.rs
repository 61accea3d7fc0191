use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;

/// Supported cloud storage providers.
///
/// # Examples
///
/// ```
/// use core_auth::ProviderKind;
///
/// let provider = ProviderKind::GoogleDrive;
/// assert_eq!(provider.display_name(), "Google Drive");
/// assert_eq!(provider.as_str(), "google_drive");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Dropbox,
    OneDrive,
    GoogleDrive,
}

impl ProviderKind {
    /// Every provider, in the order runs report them.
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Dropbox,
        ProviderKind::OneDrive,
        ProviderKind::GoogleDrive,
    ];

    /// Get the human-readable display name for this provider
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Dropbox => "Dropbox",
            ProviderKind::OneDrive => "OneDrive",
            ProviderKind::GoogleDrive => "Google Drive",
        }
    }

    /// Stable identifier used in storage keys, database rows and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Dropbox => "dropbox",
            ProviderKind::OneDrive => "onedrive",
            ProviderKind::GoogleDrive => "google_drive",
        }
    }

    /// Parse a provider kind from a string identifier
    ///
    /// ```
    /// use core_auth::ProviderKind;
    ///
    /// assert_eq!(ProviderKind::parse("GoogleDrive"), Some(ProviderKind::GoogleDrive));
    /// assert_eq!(ProviderKind::parse("icloud"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dropbox" => Some(ProviderKind::Dropbox),
            "onedrive" | "one_drive" => Some(ProviderKind::OneDrive),
            "google_drive" | "googledrive" => Some(ProviderKind::GoogleDrive),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for ProviderKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| AuthError::InvalidProvider(s.to_string()))
    }
}

/// OAuth 2.0 token set for one provider.
///
/// Dropbox long-lived tokens carry no expiry, so `expires_at` is optional.
/// The `Debug` implementation redacts both tokens.
///
/// ```
/// use core_auth::OAuthTokens;
///
/// let tokens = OAuthTokens::new("sl.B...".to_string(), None, Some(14_400));
/// assert!(!tokens.is_expired());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthTokens {
    /// Create a token set expiring `expires_in` seconds from now.
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: Option<i64>) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        }
    }

    /// Expired, or expiring within the next minute.
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(60)
    }

    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at - chrono::Duration::seconds(buffer_seconds),
            None => false,
        }
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_round_trips_through_identifier() {
        for provider in ProviderKind::ALL {
            assert_eq!(provider.as_str().parse::<ProviderKind>().unwrap(), provider);
        }
        assert!("box".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_serializes_as_snake_case() {
        let json = serde_json::to_string(&ProviderKind::GoogleDrive).unwrap();
        assert_eq!(json, "\"google_drive\"");
    }

    #[test]
    fn test_token_expiry() {
        let expired = OAuthTokens {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() - chrono::Duration::minutes(5)),
        };
        assert!(expired.is_expired());

        let expiring_soon = OAuthTokens {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + chrono::Duration::seconds(30)),
        };
        assert!(expiring_soon.is_expired());
        assert!(!expiring_soon.is_expired_with_buffer(0));

        let long_lived = OAuthTokens::new("a".to_string(), None, None);
        assert!(!long_lived.is_expired());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let tokens = OAuthTokens::new("secret-access".to_string(), Some("secret-refresh".to_string()), Some(3600));
        let debug = format!("{:?}", tokens);

        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
        assert!(debug.contains("[REDACTED]"));
    }
}

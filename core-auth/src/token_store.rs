//! Secure Token Storage
//!
//! One credential slot per [`ProviderKind`] in the platform secure store.
//! Tokens are serialized to JSON and never logged; corrupted entries are
//! erased on read so the provider reports "not authenticated" instead of
//! failing every run.

use crate::error::{AuthError, Result};
use crate::types::{OAuthTokens, ProviderKind};
use bridge_traits::storage::SecureStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Secure storage for provider credentials.
#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Store (or replace) the credential for `provider`.
    pub async fn store_tokens(&self, provider: ProviderKind, tokens: &OAuthTokens) -> Result<()> {
        let json = serde_json::to_vec(tokens)?;

        self.secure_store
            .set_secret(&Self::storage_key(provider), &json)
            .await
            .map_err(|e| {
                warn!(provider = provider.as_str(), error = %e, "Failed to store tokens");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(
            provider = provider.as_str(),
            has_refresh_token = tokens.refresh_token.is_some(),
            "Tokens stored securely"
        );
        Ok(())
    }

    /// Retrieve the credential for `provider`.
    ///
    /// Returns `Ok(None)` when nothing is stored. A corrupted entry is deleted
    /// and reported as [`AuthError::TokenCorrupted`].
    pub async fn retrieve_tokens(&self, provider: ProviderKind) -> Result<Option<OAuthTokens>> {
        let key = Self::storage_key(provider);

        let data = self.secure_store.get_secret(&key).await.map_err(|e| {
            warn!(provider = provider.as_str(), error = %e, "Failed to read tokens");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let Some(data) = data else {
            debug!(provider = provider.as_str(), "No tokens stored");
            return Ok(None);
        };

        match serde_json::from_slice::<OAuthTokens>(&data) {
            Ok(tokens) => Ok(Some(tokens)),
            Err(e) => {
                warn!(
                    provider = provider.as_str(),
                    error = %e,
                    "Stored tokens are corrupted, erasing"
                );
                if let Err(delete_err) = self.secure_store.delete_secret(&key).await {
                    warn!(
                        provider = provider.as_str(),
                        error = %delete_err,
                        "Failed to delete corrupted token data"
                    );
                }
                Err(AuthError::TokenCorrupted {
                    provider,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Erase the credential for `provider`. Idempotent.
    pub async fn delete_tokens(&self, provider: ProviderKind) -> Result<()> {
        self.secure_store
            .delete_secret(&Self::storage_key(provider))
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;

        info!(provider = provider.as_str(), "Tokens deleted");
        Ok(())
    }

    /// A usable access token, if the provider is signed in and not expired.
    pub async fn access_token(&self, provider: ProviderKind) -> Result<Option<String>> {
        Ok(self
            .retrieve_tokens(provider)
            .await?
            .filter(|tokens| !tokens.is_expired())
            .map(|tokens| tokens.access_token))
    }

    /// Whether `provider` currently holds a usable credential.
    ///
    /// Storage failures and corrupted entries count as signed out.
    pub async fn is_authenticated(&self, provider: ProviderKind) -> bool {
        match self.access_token(provider).await {
            Ok(token) => token.is_some(),
            Err(e) => {
                debug!(provider = provider.as_str(), error = %e, "Treating provider as signed out");
                false
            }
        }
    }

    fn storage_key(provider: ProviderKind) -> String {
        format!("oauth_tokens:{}", provider.as_str())
    }
}

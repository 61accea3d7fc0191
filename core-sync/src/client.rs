//! # Remote Storage Client
//!
//! Uniform capability interface implemented once per cloud provider.
//!
//! Adapters own their credentials and wire protocol; the engine only sees
//! this trait. The composite [`RemoteStorageClient::background_synchronization`]
//! has a default implementation that every adapter shares, so
//! provider-specific behavior is limited to listing and uploading.

use async_trait::async_trait;
use core_auth::ProviderKind;
use core_library::Photo;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::cancellation::CancellationToken;
use crate::provider_task::{self, SyncContext};
use crate::run::ProviderReport;

/// Failure of a single remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The session is invalid. The provider is abandoned for the run.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transient transport failure. The photo stays pending.
    #[error("Network error: {0}")]
    Network(String),

    /// The account is out of space. Remaining uploads are abandoned.
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The provider asked the client to back off.
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The run's token was set before the transfer started.
    #[error("Upload cancelled before transfer")]
    Cancelled,

    /// Any other rejection of this particular photo.
    #[error("Remote error: {0}")]
    Other(String),
}

impl RemoteError {
    /// Errors that end the provider's portion of the run.
    pub fn is_fatal_for_provider(&self) -> bool {
        matches!(
            self,
            RemoteError::Auth(_) | RemoteError::QuotaExceeded(_) | RemoteError::Cancelled
        )
    }
}

/// Confirmation of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReceipt {
    /// Provider-assigned identifier of the stored object
    pub remote_id: String,
}

impl RemoteReceipt {
    pub fn new(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
        }
    }
}

/// One cloud storage destination.
#[async_trait]
pub trait RemoteStorageClient: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Whether a usable credential is present. No side effects.
    async fn is_authenticated(&self) -> bool;

    /// File names already stored in `album/folder`.
    ///
    /// A folder that does not exist yet yields an empty set.
    async fn list_remote_folder(
        &self,
        album: &str,
        folder: &str,
    ) -> Result<HashSet<String>, RemoteError>;

    /// Upload one photo into `album/folder`.
    ///
    /// Implementations check `token` before starting the transfer and return
    /// [`RemoteError::Cancelled`] instead of starting one; a transfer that has
    /// started is never interrupted.
    async fn upload(
        &self,
        photo: &Photo,
        album: &str,
        folder: &str,
        token: &CancellationToken,
    ) -> Result<RemoteReceipt, RemoteError>;

    /// Upload every photo pending for this provider, oldest first.
    ///
    /// Never fails: the result of the provider's portion of the run is
    /// reported as a [`ProviderReport`].
    async fn background_synchronization(&self, ctx: &SyncContext) -> ProviderReport {
        provider_task::synchronize(self, ctx).await
    }
}

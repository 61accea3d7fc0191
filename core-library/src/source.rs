//! The photo catalogue as seen by the sync engine.

use async_trait::async_trait;
use core_auth::ProviderKind;

use crate::error::Result;
use crate::models::{Photo, PhotoId};

/// Enumerates photos awaiting upload and records per-provider outcomes.
///
/// Each provider task writes only its own `(photo, provider)` cell, so
/// implementations need no cross-provider locking. Writes must keep one rule:
/// a cell that reached `Synced` stays `Synced`.
#[async_trait]
pub trait PhotoSource: Send + Sync {
    /// Photos not yet synced to `provider`, oldest capture first.
    ///
    /// Includes photos left `Uploading` or `Failed` by earlier runs.
    async fn list_pending(&self, provider: ProviderKind) -> Result<Vec<Photo>>;

    /// Record that an upload of `photo` to `provider` is starting.
    async fn mark_uploading(&self, photo: &PhotoId, provider: ProviderKind) -> Result<()>;

    /// Record a confirmed upload. Idempotent.
    async fn mark_synced(
        &self,
        photo: &PhotoId,
        provider: ProviderKind,
        remote_id: Option<&str>,
    ) -> Result<()>;

    /// Record a per-photo failure; the photo stays a candidate for later runs.
    async fn mark_failed(&self, photo: &PhotoId, provider: ProviderKind, reason: &str)
        -> Result<()>;

    /// Return an interrupted upload to pending.
    async fn mark_pending(&self, photo: &PhotoId, provider: ProviderKind) -> Result<()>;
}

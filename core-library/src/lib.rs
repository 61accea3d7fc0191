//! # Photo Library Module
//!
//! Local photo catalogue and per-provider sync status.
//!
//! ## Overview
//!
//! - [`models`] - `Photo`, its lazily loaded content and the per-provider
//!   [`SyncState`](models::SyncState) map
//! - [`db`] - SQLite pool creation with embedded migrations
//! - [`source`] - the [`PhotoSource`] contract the sync engine consumes
//! - [`repositories`] - SQLite implementation of the catalogue and of `PhotoSource`
//!
//! Sync status is the only persistent state of the sync subsystem: a photo is
//! pending for a provider until that provider confirmed an upload, and a
//! confirmed cell never goes back.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod source;

pub use error::{LibraryError, Result};
pub use models::{ContentHandle, Photo, PhotoId, SyncState};
pub use repositories::{PhotoRepository, SqlitePhotoRepository};
pub use source::PhotoSource;

//! # Google Drive Provider
//!
//! Implements `RemoteStorageClient` for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - `album/folder` path resolution to Drive folder ids, creating missing
//!   folders on upload
//! - Paginated listing of a folder's children for duplicate suppression
//! - Multipart uploads (`uploadType=multipart`)
//! - Mapping of Drive error reasons (`storageQuotaExceeded`,
//!   `userRateLimitExceeded`, ...) onto the sync error taxonomy

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleDriveConnector;
pub use error::{GoogleDriveError, Result};

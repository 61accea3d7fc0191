//! # OneDrive Provider
//!
//! Implements `RemoteStorageClient` for Microsoft Graph API (OneDrive).
//!
//! ## Overview
//!
//! This module provides:
//! - Path-addressed listing of `album/folder` children with `@odata.nextLink`
//!   pagination
//! - Simple uploads (`PUT .../content`) that never overwrite an existing item
//! - Throttling and quota responses mapped per Graph API guidelines

pub mod connector;
pub mod error;
pub mod types;

pub use connector::OneDriveConnector;
pub use error::{OneDriveError, Result};

//! # Dropbox Provider
//!
//! Implements `RemoteStorageClient` for the Dropbox API v2.
//!
//! ## Overview
//!
//! This module provides:
//! - `files/list_folder` listing with cursor continuation
//! - Single-request uploads through `files/upload` in `add` mode, so an
//!   existing remote file is never replaced
//! - Mapping of `error_summary` tags (`path/not_found`,
//!   `path/insufficient_space`) onto the sync error taxonomy

pub mod connector;
pub mod error;
pub mod types;

pub use connector::DropboxConnector;
pub use error::{DropboxError, Result};

//! Workspace umbrella crate.
//!
//! Re-exports `core-service` behind the `desktop-shims` feature so a host
//! application can depend on `photosync-workspace` alone and get the photo
//! sync core with the desktop bridges wired in.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;

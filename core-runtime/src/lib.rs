//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the photo sync core:
//! - Logging and tracing bootstrap
//! - Configuration and sync timing settings
//! - Event bus for sync and scheduler notifications
//!
//! Every other crate in the workspace depends on this one for its
//! configuration types and event vocabulary.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, SyncSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, SchedulerEvent, SyncEvent};

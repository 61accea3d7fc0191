//! # Background Photo Synchronization
//!
//! Mirrors locally captured photos to every signed-in cloud provider inside
//! OS-granted background windows.
//!
//! ## Overview
//!
//! ```text
//! lifecycle event → SyncScheduler → SynchronizationEngine::run_once
//!                                      ├─ Dropbox task     ─┐
//!                                      ├─ OneDrive task     ├─ shared CancellationToken
//!                                      └─ Google Drive task ─┘
//! ```
//!
//! ## Components
//!
//! - **Cancellation** (`cancellation`): set-once flag polled between uploads
//! - **Remote Storage Client** (`client`): the per-provider capability trait
//! - **Provider Task** (`provider_task`): list, diff and upload for one provider
//! - **Run Model** (`run`): per-provider outcomes and the aggregate result
//! - **Engine** (`engine`): concurrent provider tasks under a deadline
//! - **Scheduler** (`scheduler`): `Idle → Scheduled → Running` window handling

pub mod cancellation;
pub mod client;
pub mod engine;
pub mod error;
pub mod provider_task;
pub mod run;
pub mod scheduler;

pub use cancellation::CancellationToken;
pub use client::{RemoteError, RemoteReceipt, RemoteStorageClient};
pub use engine::SynchronizationEngine;
pub use error::{Result, SyncError};
pub use provider_task::SyncContext;
pub use run::{ProviderOutcome, ProviderReport, SyncRun, SyncRunId, SyncRunResult};
pub use scheduler::{SchedulerState, SyncScheduler};

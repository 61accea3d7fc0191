//! Cooperative cancellation for a sync run.
//!
//! One token is created per run and shared by every provider task. It is
//! polled between uploads, never awaited, and never reset: a new run gets a
//! new token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set-once cancellation flag shared across provider tasks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the run cancelled.
    ///
    /// Returns `true` only for the call that actually flipped the flag;
    /// later calls are no-ops.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether both handles observe the same flag.
    pub fn same_run(&self, other: &CancellationToken) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

//! Cooperative cancellation
//!
//! The engine checks the flag before scheduling each step. Cancelling never
//! rolls back state already applied or audit entries already written.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag for one run
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Guard that cancels the run when dropped unless disarmed first
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            flag: self.clone(),
            armed: true,
        }
    }
}

/// Cancels its flag on drop. Held by request handlers so a dropped
/// request future stops the run it started.
#[derive(Debug)]
pub struct CancelOnDrop {
    flag: CancellationFlag,
    armed: bool,
}

impl CancelOnDrop {
    /// Keep the run going after the guard is dropped
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("Request dropped, cancelling run");
            self.flag.cancel();
        }
    }
}

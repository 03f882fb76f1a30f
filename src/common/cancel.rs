//! Cooperative teardown flag for component-scoped async effects
//!
//! Tearing down a view does not abort its in-flight requests; the response
//! still arrives, and the effect must check this flag before committing any
//! state so a dead view never writes a stale update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheap, cloneable cancellation marker
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the owning scope as torn down
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

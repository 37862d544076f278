//! Cooperative cancellation for blocking measurement loops.
//!
//! The sampler busy-waits on the echo line; a [`CancelToken`] is polled
//! alongside every pin read and between sleep slices so another thread
//! (or a Ctrl-C handler) can stop it without waiting for the timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable shutdown flag.  All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.  Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clear the flag so the token can be reused for the next call.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

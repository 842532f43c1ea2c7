//! Shared cancellation primitive used by every long-running task in this
//! crate: Writer sends, Reader receives, operator loops, the multiplexer's
//! broadcast task, and the event bus all select against the same
//! `ShutdownSignal` rather than each inventing their own cancel flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared state behind every clone of a [`ShutdownSignal`].
#[derive(Debug, Default)]
struct ShutdownState {
    cancelled: AtomicBool,
}

/// A cloneable cancellation token.
///
/// Calling [`ShutdownSignal::cancel`] is idempotent: only the first call has
/// an effect, and `notify_waiters` wakes every task currently parked on
/// [`ShutdownSignal::cancelled`].
#[derive(Clone)]
pub struct ShutdownSignal {
    state: Arc<ShutdownState>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ShutdownState::default()),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.state.cancelled.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel()` has been called. Safe to race against other
    /// branches of a `tokio::select!` in every task loop.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.notify.notified();
            tokio::pin!(notified);
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

//! Cooperative stop requests.

use mio::Waker;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Asks a running [`EventHandler`](crate::EventHandler) to stop
///
/// The handler checks the request between wakeups; the waker makes sure a
/// blocked wait returns promptly. Safe to use from any thread and from
/// inside subscriber callbacks.
#[derive(Clone)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl StopHandle {
    pub(crate) fn new(waker: Waker) -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            waker: Arc::new(waker),
        }
    }

    /// Request the dispatch loop to stop
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
        if let Err(e) = self.waker.wake() {
            tracing::warn!("Failed to wake event loop: {}", e);
        }
    }

    /// Whether a stop has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopHandle")
            .field("requested", &self.is_stop_requested())
            .finish()
    }
}

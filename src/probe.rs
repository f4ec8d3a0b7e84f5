//! Lifecycle counters shared between a collaborator and its owner.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counters {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

/// Counts `start()`/`stop()` calls on a collaborator after it has been moved
/// into a session.
///
/// Cloning is cheap; all clones observe the same counters.
#[derive(Debug, Clone, Default)]
pub struct LifecycleProbe {
    counters: Arc<Counters>,
}

impl LifecycleProbe {
    /// Creates a probe with both counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `start()` calls observed.
    pub fn starts(&self) -> usize {
        self.counters.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop()` calls observed.
    pub fn stops(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn record_start(&self) {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_stop(&self) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
    }
}

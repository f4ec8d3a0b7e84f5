//! Presentation timestamps for encoded samples.
//!
//! Every track owns a [`TimestampClock`] reading from a shared
//! [`ClockSource`]. The clock never hands out a value below the last PTS the
//! track actually wrote to the container, so the PTS sequence the container
//! sees is non-decreasing even when the underlying source steps backwards.

use std::sync::Arc;
use std::time::Instant;

/// A source of microsecond wall-clock readings.
///
/// Readings are expected to be roughly monotonic but may step backwards or
/// repeat (clock skew, coarse resolution); [`TimestampClock`] corrects for that.
///
/// Any `Fn() -> u64` closure is a clock source, which keeps tests simple:
///
/// ```
/// use multitrack_capture::ClockSource;
///
/// let fixed = || 1_000u64;
/// assert_eq!(fixed.now_us(), 1_000);
/// ```
pub trait ClockSource: Send + Sync {
    /// Returns the current reading in microseconds.
    fn now_us(&self) -> u64;
}

impl<F> ClockSource for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn now_us(&self) -> u64 {
        self()
    }
}

/// Process-monotonic clock counting microseconds from its creation.
///
/// One instance is shared by all tracks of a session so their timestamps
/// share an epoch.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose epoch is now.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for MonotonicClock {
    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }
}

/// Per-track presentation timestamp generator.
pub struct TimestampClock {
    source: Arc<dyn ClockSource>,
    last_us: u64,
}

impl TimestampClock {
    /// Creates a clock over the given source with a floor of zero.
    pub fn new(source: Arc<dyn ClockSource>) -> Self {
        Self { source, last_us: 0 }
    }

    /// Returns the next presentation timestamp.
    ///
    /// A reading at or below the last committed PTS is folded forward by the
    /// size of the step: `last + (last - raw)`. Calls made before the next
    /// [`commit`](Self::commit) all observe the same floor. The fold saturates
    /// at `u64::MAX`.
    pub fn next(&self) -> u64 {
        let raw = self.source.now_us();
        if raw <= self.last_us {
            self.last_us.saturating_add(self.last_us - raw)
        } else {
            raw
        }
    }

    /// Records a PTS that was written to the container.
    pub fn commit(&mut self, pts_us: u64) {
        self.last_us = self.last_us.max(pts_us);
    }

    /// Returns the last committed PTS.
    pub fn last(&self) -> u64 {
        self.last_us
    }
}

impl std::fmt::Debug for TimestampClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampClock")
            .field("last_us", &self.last_us)
            .finish_non_exhaustive()
    }
}

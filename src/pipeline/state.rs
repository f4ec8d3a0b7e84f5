//! Session-wide pipeline state.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::event::EventCallback;
use crate::PipelineEvent;

/// Flags shared between the control surface and the capture loop.
///
/// Every session gets fresh flags, so a loop that is still tearing down can
/// never touch the next session's state.
///
/// Only these two values cross the thread boundary. The control surface
/// writes `stop_requested`; the capture loop (and session startup) writes
/// `capturing`.
#[derive(Debug, Default)]
pub(crate) struct SessionFlags {
    capturing: AtomicBool,
    stop_requested: AtomicBool,
}

impl SessionFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    pub fn set_capturing(&self, capturing: bool) {
        self.capturing.store(capturing, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Sets `stop_requested` and returns `true` if it was already set.
    pub fn request_stop(&self) -> bool {
        self.stop_requested.swap(true, Ordering::SeqCst)
    }
}

/// Fan-in counter of tracks that have not reached end-of-stream.
///
/// Owned by the capture loop; drains call [`track_ended`](Self::track_ended)
/// exactly once per track. The last call clears `capturing`.
#[derive(Debug)]
pub(crate) struct StreamingTracks {
    remaining: usize,
}

impl StreamingTracks {
    pub fn new(tracks: usize) -> Self {
        Self { remaining: tracks }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Records that `track` drained its final output and returns how many
    /// tracks are still streaming.
    pub fn track_ended(
        &mut self,
        track: usize,
        flags: &SessionFlags,
        events: Option<&EventCallback>,
    ) -> usize {
        self.remaining = self.remaining.saturating_sub(1);
        tracing::info!(track, streaming = self.remaining, "track reached end of stream");
        if let Some(cb) = events {
            cb(PipelineEvent::TrackEnded {
                track,
                streaming: self.remaining,
            });
        }
        if self.remaining == 0 {
            flags.set_capturing(false);
        }
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_stop_reports_repeat() {
        let flags = SessionFlags::new();
        assert!(!flags.request_stop());
        assert!(flags.request_stop());
        assert!(flags.stop_requested());
        assert!(!flags.is_capturing());
    }

    #[test]
    fn test_last_track_clears_capturing() {
        let flags = SessionFlags::new();
        flags.set_capturing(true);
        let mut streaming = StreamingTracks::new(2);

        assert_eq!(streaming.track_ended(1, &flags, None), 1);
        assert!(flags.is_capturing());
        assert_eq!(streaming.track_ended(0, &flags, None), 0);
        assert!(!flags.is_capturing());
    }

    #[test]
    fn test_track_ended_emits_event() {
        use parking_lot::Mutex;
        use std::sync::Arc;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let cb = crate::event_callback(move |e| seen_clone.lock().push(e));

        let flags = SessionFlags::new();
        let mut streaming = StreamingTracks::new(1);
        streaming.track_ended(0, &flags, Some(&cb));

        assert_eq!(
            *seen.lock(),
            vec![PipelineEvent::TrackEnded {
                track: 0,
                streaming: 0
            }]
        );
        assert_eq!(streaming.remaining(), 0);
    }
}

//! Runtime events for monitoring a recording session.
//!
//! Events are non-fatal notifications about pipeline progress. The session
//! keeps running after an event is emitted - they're for logging/metrics,
//! not control flow.

use std::sync::Arc;

/// Runtime events emitted by the capture loop.
///
/// # Example
///
/// ```
/// use multitrack_capture::PipelineEvent;
///
/// fn handle_event(event: PipelineEvent) {
///     match event {
///         PipelineEvent::TrackFormatRegistered { track, container_track, registered, total } => {
///             eprintln!("track {track} -> container track {container_track} ({registered}/{total})");
///         }
///         PipelineEvent::ContainerOpened { tracks } => eprintln!("muxing {tracks} tracks"),
///         PipelineEvent::InputRejected { track, reason } => {
///             eprintln!("track {track}: input slot rejected: {reason}");
///         }
///         PipelineEvent::TrackEnded { track, streaming } => {
///             eprintln!("track {track} ended, {streaming} still streaming");
///         }
///         PipelineEvent::SessionClosed => eprintln!("done"),
///         PipelineEvent::SessionAborted { reason } => eprintln!("aborted: {reason}"),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A track's output format was accepted by the container writer.
    TrackFormatRegistered {
        /// Pipeline track index.
        track: usize,
        /// Index the container assigned to this track.
        container_track: usize,
        /// Tracks registered so far, including this one.
        registered: usize,
        /// Total tracks in the session.
        total: usize,
    },

    /// Every track registered and the container writer was started.
    ContainerOpened {
        /// Number of tracks in the container.
        tracks: usize,
    },

    /// An encoder rejected an input slot. The pump retries.
    InputRejected {
        /// Pipeline track index.
        track: usize,
        /// Description of the rejection.
        reason: String,
    },

    /// A track drained its final end-of-stream output.
    TrackEnded {
        /// Pipeline track index.
        track: usize,
        /// Tracks that have not reached end-of-stream yet.
        streaming: usize,
    },

    /// Every track ended and the container writer was stopped.
    SessionClosed,

    /// The session was aborted by a fatal error.
    SessionAborted {
        /// Description of the fatal error.
        reason: String,
    },
}

/// Callback type for receiving runtime events.
///
/// Register an event callback via [`SessionSetupBuilder::on_event()`].
///
/// [`SessionSetupBuilder::on_event()`]: crate::SessionSetupBuilder::on_event
pub type EventCallback = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use multitrack_capture::{event_callback, PipelineEvent};
///
/// let callback = event_callback(|event| {
///     println!("Got event: {:?}", event);
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(PipelineEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_event_debug() {
        let event = PipelineEvent::ContainerOpened { tracks: 3 };
        let debug = format!("{:?}", event);
        assert!(debug.contains("ContainerOpened"));
        assert!(debug.contains('3'));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(PipelineEvent::SessionClosed);
        assert!(called.load(Ordering::SeqCst));
    }
}

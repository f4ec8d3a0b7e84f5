//! Recording session control.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::builder::SessionSetup;
use crate::pipeline::{PipelineController, SessionFlags};
use crate::CaptureError;

/// Name of the thread running the capture loop.
const CAPTURE_THREAD_NAME: &str = "capture-loop";

/// Outcome of a start or stop request, suitable for showing an operator.
///
/// The `Display` text is the operator-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStatus {
    /// A session started with this many tracks.
    Started {
        /// Number of tracks being recorded.
        tracks: usize,
    },
    /// A start request arrived while a session was capturing. Nothing changed.
    AlreadyInProgress,
    /// The stop request was accepted; tracks are being flushed.
    Accepted,
    /// A stop was already requested for this session. Nothing changed.
    AlreadyRequested,
    /// A stop request arrived while no session was capturing. Nothing changed.
    NotInProgress,
}

impl ControlStatus {
    /// Returns `true` if the request changed session state.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Started { .. } | Self::Accepted)
    }
}

impl fmt::Display for ControlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { tracks } => write!(f, "Start recording audio on {tracks} channels"),
            Self::AlreadyInProgress => f.write_str("Recording in progress!"),
            Self::Accepted => f.write_str("Request stop recording"),
            Self::AlreadyRequested => f.write_str("Stop already requested!"),
            Self::NotInProgress => f.write_str("Recording not in progress"),
        }
    }
}

/// Lifecycle phase of the most recent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No session has been started.
    #[default]
    Idle,
    /// The capture loop is running.
    Capturing,
    /// Stop was requested; tracks are being flushed.
    Stopping,
    /// Every track ended and the container was stopped.
    Closed,
    /// The session was aborted by a fatal error.
    Failed,
}

impl SessionPhase {
    /// Returns `true` while a session is capturing or flushing.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Capturing | Self::Stopping)
    }
}

/// What one track contributed to the container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackReport {
    /// Pipeline track index.
    pub track: usize,
    /// Index the container assigned, if the format was registered.
    pub container_track: Option<usize>,
    /// Samples written to the container.
    pub samples_written: u64,
    /// Payload bytes written to the container.
    pub bytes_written: u64,
    /// PTS of the last written sample, in microseconds.
    pub last_pts_us: u64,
}

/// Summary of a completed session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// One entry per track, in track order.
    pub tracks: Vec<TrackReport>,
    /// Whether the container was started.
    pub container_opened: bool,
}

impl SessionReport {
    /// Total samples written across all tracks.
    pub fn samples_written(&self) -> u64 {
        self.tracks.iter().map(|t| t.samples_written).sum()
    }

    /// Total payload bytes written across all tracks.
    pub fn bytes_written(&self) -> u64 {
        self.tracks.iter().map(|t| t.bytes_written).sum()
    }
}

type LoopHandle = JoinHandle<Result<SessionReport, CaptureError>>;

/// The most recent session: its own flags and, until joined, its loop.
struct ActiveSession {
    flags: Arc<SessionFlags>,
    handle: Option<LoopHandle>,
}

/// Control surface for recording sessions.
///
/// A `Recorder` runs at most one session at a time. Each session records a
/// fixed set of tracks on a dedicated capture loop thread until
/// [`request_stop()`](Self::request_stop), then flushes every track and
/// closes the container.
///
/// # Lifecycle
///
/// 1. [`start_session()`](Self::start_session) starts every source and
///    encoder, then the capture loop
/// 2. Capture runs in the background
/// 3. [`request_stop()`](Self::request_stop) asks the loop to flush
/// 4. [`wait()`](Self::wait) or [`closed()`](Self::closed) observe the end
///
/// # Example
///
/// ```
/// use multitrack_capture::{
///     AudioFormat, MemoryWriter, MockSource, PcmEncoder, Recorder, SessionSetup,
/// };
///
/// let mut source = MockSource::new(16_000, 1);
/// source.generate_sine(440.0, 100);
///
/// let setup = SessionSetup::builder()
///     .add_track(source, PcmEncoder::new(AudioFormat::pcm_s16le(16_000, 1)))
///     .container(MemoryWriter::new())
///     .build()
///     .unwrap();
///
/// let recorder = Recorder::new();
/// println!("{}", recorder.start_session(setup).unwrap());
/// println!("{}", recorder.request_stop());
/// let report = recorder.wait().unwrap();
/// assert!(report.container_opened);
/// ```
pub struct Recorder {
    session: Mutex<Option<ActiveSession>>,
    phase: Arc<watch::Sender<SessionPhase>>,
    /// Bumped on every start; a loop only publishes its final phase while
    /// its own generation is current.
    generation: Arc<AtomicU64>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder {
    /// Creates an idle recorder.
    pub fn new() -> Self {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        Self {
            session: Mutex::new(None),
            phase: Arc::new(phase),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts a session.
    ///
    /// Returns [`ControlStatus::AlreadyInProgress`] without touching `setup`'s
    /// collaborators if a session is capturing. If the previous session has
    /// ended but its loop is still stopping collaborators, this waits for
    /// that loop to exit first.
    ///
    /// # Errors
    ///
    /// Returns an error if a source or encoder fails to start (everything
    /// already started is stopped again) or the capture thread cannot be
    /// spawned. The recorder stays idle.
    pub fn start_session(&self, setup: SessionSetup) -> Result<ControlStatus, CaptureError> {
        let mut session = self.session.lock();
        if let Some(active) = session.as_mut() {
            if active.flags.is_capturing() {
                tracing::warn!("start requested while recording is in progress");
                return Ok(ControlStatus::AlreadyInProgress);
            }
            if let Some(previous) = active.handle.take() {
                Self::reap(previous);
            }
        }

        let flags = Arc::new(SessionFlags::new());
        let mut controller = PipelineController::new(setup, Arc::clone(&flags));
        let tracks = controller.track_count();
        controller.start()?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        flags.set_capturing(true);
        self.phase.send_replace(SessionPhase::Capturing);

        let phase = Arc::clone(&self.phase);
        let current = Arc::clone(&self.generation);
        let spawned = std::thread::Builder::new()
            .name(CAPTURE_THREAD_NAME.to_string())
            .spawn(move || {
                let result = controller.run();
                let end = if result.is_ok() {
                    SessionPhase::Closed
                } else {
                    SessionPhase::Failed
                };
                phase.send_if_modified(|phase| {
                    if current.load(Ordering::SeqCst) != generation {
                        return false;
                    }
                    *phase = end;
                    true
                });
                result
            });

        match spawned {
            Ok(join) => {
                *session = Some(ActiveSession {
                    flags,
                    handle: Some(join),
                });
                tracing::info!(tracks, "recording session started");
                Ok(ControlStatus::Started { tracks })
            }
            Err(e) => {
                // The controller was dropped with the closure, which stopped
                // every track and the container
                flags.set_capturing(false);
                self.phase.send_replace(SessionPhase::Failed);
                *session = Some(ActiveSession {
                    flags,
                    handle: None,
                });
                Err(CaptureError::Spawn(e))
            }
        }
    }

    /// Joins a previous loop that nobody waited for.
    fn reap(previous: LoopHandle) {
        if !previous.is_finished() {
            tracing::debug!("waiting for previous capture loop to finish");
        }
        match previous.join() {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::debug!("previous session had failed: {}", e),
            Err(_) => tracing::warn!("previous capture loop panicked"),
        }
    }

    fn flags(&self) -> Option<Arc<SessionFlags>> {
        self.session
            .lock()
            .as_ref()
            .map(|active| Arc::clone(&active.flags))
    }

    /// Asks the running session to stop.
    ///
    /// The capture loop notices the request within one cycle, flushes every
    /// track and closes the container. Use [`wait()`](Self::wait) or
    /// [`closed()`](Self::closed) to observe completion.
    pub fn request_stop(&self) -> ControlStatus {
        let Some(flags) = self.flags() else {
            return ControlStatus::NotInProgress;
        };
        if !flags.is_capturing() {
            return ControlStatus::NotInProgress;
        }
        if flags.request_stop() {
            return ControlStatus::AlreadyRequested;
        }

        // The loop may already have closed between the two checks
        self.phase.send_if_modified(|phase| {
            if *phase == SessionPhase::Capturing {
                *phase = SessionPhase::Stopping;
                true
            } else {
                false
            }
        });
        tracing::info!("stop requested");
        ControlStatus::Accepted
    }

    /// Returns `true` while a session may still produce output.
    pub fn is_capturing(&self) -> bool {
        self.flags().is_some_and(|flags| flags.is_capturing())
    }

    /// Returns the phase of the most recent session.
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Returns a receiver that observes phase changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Blocks until the current session's capture loop exits.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that aborted the session,
    /// [`CaptureError::NoSession`] if there is nothing to wait for, or
    /// [`CaptureError::LoopPanicked`].
    pub fn wait(&self) -> Result<SessionReport, CaptureError> {
        let handle = self
            .session
            .lock()
            .as_mut()
            .and_then(|active| active.handle.take())
            .ok_or(CaptureError::NoSession)?;
        handle.join().map_err(|_| CaptureError::LoopPanicked)?
    }

    /// Waits asynchronously until no session is active and returns the
    /// final phase.
    ///
    /// Returns immediately if no session is capturing or flushing.
    pub async fn closed(&self) -> SessionPhase {
        let mut rx = self.phase.subscribe();
        let result = rx.wait_for(|phase| !phase.is_active()).await;
        match result {
            Ok(phase) => *phase,
            // The sender lives in `self`, so this only happens during teardown
            Err(_) => self.phase(),
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(active) = self.session.get_mut() {
            if active.flags.is_capturing() {
                // Dropped without waiting - ask the loop to flush and close on its own
                active.flags.request_stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_status_messages() {
        assert_eq!(
            ControlStatus::Started { tracks: 3 }.to_string(),
            "Start recording audio on 3 channels"
        );
        assert_eq!(
            ControlStatus::AlreadyInProgress.to_string(),
            "Recording in progress!"
        );
        assert_eq!(ControlStatus::Accepted.to_string(), "Request stop recording");
        assert_eq!(
            ControlStatus::AlreadyRequested.to_string(),
            "Stop already requested!"
        );
        assert_eq!(
            ControlStatus::NotInProgress.to_string(),
            "Recording not in progress"
        );
    }

    #[test]
    fn test_control_status_accepted() {
        assert!(ControlStatus::Accepted.is_accepted());
        assert!(ControlStatus::Started { tracks: 1 }.is_accepted());
        assert!(!ControlStatus::NotInProgress.is_accepted());
    }

    #[test]
    fn test_idle_recorder() {
        let recorder = Recorder::new();
        assert_eq!(recorder.phase(), SessionPhase::Idle);
        assert!(!recorder.is_capturing());
        assert_eq!(recorder.request_stop(), ControlStatus::NotInProgress);
        assert!(matches!(recorder.wait(), Err(CaptureError::NoSession)));
    }

    #[test]
    fn test_session_report_totals() {
        let report = SessionReport {
            tracks: vec![
                TrackReport {
                    samples_written: 2,
                    bytes_written: 10,
                    ..Default::default()
                },
                TrackReport {
                    track: 1,
                    samples_written: 3,
                    bytes_written: 5,
                    ..Default::default()
                },
            ],
            container_opened: true,
        };
        assert_eq!(report.samples_written(), 5);
        assert_eq!(report.bytes_written(), 15);
    }

    #[test]
    fn test_phase_activity() {
        assert!(SessionPhase::Capturing.is_active());
        assert!(SessionPhase::Stopping.is_active());
        assert!(!SessionPhase::Closed.is_active());
        assert!(!SessionPhase::Failed.is_active());
        assert!(!SessionPhase::Idle.is_active());
    }
}

//! Error types for multitrack-capture.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`CaptureError`]): Prevent a session from starting, or
//!   abort a running session because a collaborator broke its contract
//! - **Recoverable conditions**: Transient slot unavailability and rejected
//!   input slots, retried locally and surfaced via
//!   [`EventCallback`](crate::EventCallback) only

use std::path::PathBuf;

/// Fatal errors for a recording session.
///
/// Setup failures are returned from [`SessionSetupBuilder::build()`] and
/// [`Recorder::start_session()`] before any track starts capturing. Protocol
/// violations abort a running session and are returned from
/// [`Recorder::wait()`].
///
/// [`SessionSetupBuilder::build()`]: crate::SessionSetupBuilder::build
/// [`Recorder::start_session()`]: crate::Recorder::start_session
/// [`Recorder::wait()`]: crate::Recorder::wait
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// No tracks were configured before building the session.
    #[error("no tracks configured - use add_track() to add at least one track")]
    NoTracksConfigured,

    /// No container writer was configured before building the session.
    #[error("no container writer configured")]
    NoContainerConfigured,

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A capture source could not be started.
    #[error("track {track}: capture source '{source_name}' failed to start: {source}")]
    SourceStartFailed {
        /// Track index of the failing source.
        track: usize,
        /// Name of the failing source.
        source_name: String,
        /// The underlying source error.
        #[source]
        source: SourceError,
    },

    /// An encoder could not be started.
    #[error("track {track}: encoder '{encoder_name}' failed to start: {source}")]
    EncoderStartFailed {
        /// Track index of the failing encoder.
        track: usize,
        /// Name of the failing encoder.
        encoder_name: String,
        /// The underlying encoder error.
        #[source]
        source: EncoderError,
    },

    /// The capture loop thread could not be spawned.
    #[error("failed to spawn capture loop: {0}")]
    Spawn(#[source] std::io::Error),

    /// An encoder reported an output slot whose buffer resolves to no data.
    #[error("track {track}: encoder output buffer at slot {slot} is missing")]
    MissingOutputBuffer {
        /// Track index whose encoder misbehaved.
        track: usize,
        /// The output slot that resolved to nothing.
        slot: usize,
    },

    /// An encoder announced its output format more than once.
    #[error("track {track}: output format announced more than once")]
    DuplicateFormat {
        /// Track index whose encoder misbehaved.
        track: usize,
    },

    /// The container writer would have been started a second time.
    #[error("container writer started multiple times")]
    ContainerAlreadyOpen,

    /// An encoder failed while draining output.
    #[error("track {track}: encoder error: {source}")]
    Encoder {
        /// Track index of the failing encoder.
        track: usize,
        /// The underlying encoder error.
        #[source]
        source: EncoderError,
    },

    /// The container writer failed.
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// The capture loop panicked.
    #[error("capture loop panicked")]
    LoopPanicked,

    /// [`Recorder::wait()`](crate::Recorder::wait) was called with no session to wait for.
    #[error("no session has been started")]
    NoSession,
}

/// Errors reported by an [`Encoder`](crate::Encoder) implementation.
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    /// The encoder rejected an input or output slot index.
    #[error("invalid slot index {slot}")]
    InvalidSlot {
        /// The slot index that was rejected.
        slot: usize,
    },

    /// The encoder was used before `start()` or after `stop()`.
    #[error("encoder not running")]
    NotRunning,

    /// The encoder has already seen end-of-stream and accepts no more input.
    #[error("input submitted after end-of-stream")]
    InputAfterEndOfStream,

    /// The output format was requested before the encoder announced it.
    #[error("output format not yet available")]
    FormatUnavailable,

    /// Custom error for user-implemented encoders.
    #[error("{0}")]
    Custom(String),
}

impl EncoderError {
    /// Creates a custom encoder error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Errors reported by a [`ContainerWriter`](crate::ContainerWriter).
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// A track was added after the container started.
    #[error("cannot add a track after the container started")]
    TrackAfterStart,

    /// `start()` was called more than once.
    #[error("container already started")]
    AlreadyStarted,

    /// A sample was written before `start()`.
    #[error("container not started")]
    NotStarted,

    /// A sample referenced a track the container does not know.
    #[error("unknown container track {track}")]
    UnknownTrack {
        /// The unknown container track index.
        track: usize,
    },

    /// The receiving channel was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// A value does not fit the container's length field.
    #[error("{field} of {len} bytes exceeds the container limit of {max}")]
    FieldTooLarge {
        /// Which field overflowed.
        field: &'static str,
        /// Actual length in bytes.
        len: usize,
        /// Largest length the field can hold.
        max: u64,
    },

    /// File I/O error.
    #[error("file error: {path}: {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Custom error for user-implemented writers.
    #[error("{0}")]
    Custom(String),
}

impl ContainerError {
    /// Creates a custom container error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Creates a file error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors reported by a [`CaptureSource`](crate::CaptureSource).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested audio device was not found.
    #[error("device not found: {name}")]
    DeviceNotFound {
        /// Name of the device that wasn't found.
        name: String,
    },

    /// No default input device is configured on this system.
    #[error("no default input device configured")]
    NoDefaultDevice,

    /// The device's sample format is not supported.
    #[error("unsupported sample format: {format}")]
    UnsupportedFormat {
        /// The format that wasn't supported.
        format: String,
    },

    /// An error from the underlying audio library.
    #[error("audio backend error: {0}")]
    Backend(String),

    /// Custom error for user-implemented sources.
    #[error("{0}")]
    Custom(String),
}

impl SourceError {
    /// Creates a custom source error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::MissingOutputBuffer { track: 1, slot: 3 };
        assert_eq!(
            err.to_string(),
            "track 1: encoder output buffer at slot 3 is missing"
        );
    }

    #[test]
    fn test_source_start_failed_keeps_source() {
        use std::error::Error;

        let err = CaptureError::SourceStartFailed {
            track: 0,
            source_name: "mic".to_string(),
            source: SourceError::NoDefaultDevice,
        };
        assert!(err.to_string().contains("mic"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_container_error_converts() {
        let err: CaptureError = ContainerError::AlreadyStarted.into();
        assert_eq!(err.to_string(), "container error: container already started");
    }

    #[test]
    fn test_encoder_error_custom() {
        let err = EncoderError::custom("codec exploded");
        assert_eq!(err.to_string(), "codec exploded");
    }

    #[test]
    fn test_container_error_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ContainerError::io("/tmp/rec.mtrk", io_err);
        assert!(err.to_string().contains("/tmp/rec.mtrk"));
    }
}

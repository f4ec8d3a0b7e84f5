//! Builder for configuring a recording session.

use std::sync::Arc;

use crate::clock::{ClockSource, MonotonicClock};
use crate::encoder::Encoder;
use crate::event::{event_callback, EventCallback};
use crate::mux::ContainerWriter;
use crate::source::CaptureSource;
use crate::{CaptureError, PipelineConfig, PipelineEvent};

/// One capture source and the encoder that compresses it.
pub(crate) struct TrackSetup {
    pub source: Box<dyn CaptureSource>,
    pub encoder: Box<dyn Encoder>,
}

/// A validated, ready-to-start session: N tracks and one container.
///
/// Create one with [`SessionSetup::builder()`] and hand it to
/// [`Recorder::start_session()`](crate::Recorder::start_session). The track
/// count is fixed from here on.
pub struct SessionSetup {
    pub(crate) tracks: Vec<TrackSetup>,
    pub(crate) writer: Box<dyn ContainerWriter>,
    pub(crate) config: PipelineConfig,
    pub(crate) clock: Arc<dyn ClockSource>,
    pub(crate) events: Option<EventCallback>,
}

impl SessionSetup {
    /// Creates a new builder for configuring a session.
    pub fn builder() -> SessionSetupBuilder {
        SessionSetupBuilder::new()
    }

    /// Returns the number of tracks in the session.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Returns the pipeline configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl std::fmt::Debug for SessionSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tracks: Vec<(&str, &str)> = self
            .tracks
            .iter()
            .map(|t| (t.source.name(), t.encoder.name()))
            .collect();
        f.debug_struct("SessionSetup")
            .field("tracks", &tracks)
            .field("writer", &self.writer.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring a recording session.
///
/// Each [`add_track()`](Self::add_track) call adds one track; tracks are
/// indexed in the order they are added.
///
/// # Example
///
/// ```
/// use multitrack_capture::{AudioFormat, MemoryWriter, MockSource, PcmEncoder, SessionSetup};
///
/// let format = AudioFormat::pcm_s16le(16_000, 1);
/// let setup = SessionSetup::builder()
///     .add_track(MockSource::new(16_000, 1), PcmEncoder::new(format.clone()))
///     .add_track(MockSource::new(16_000, 1), PcmEncoder::new(format))
///     .container(MemoryWriter::new())
///     .on_event(|e| eprintln!("{e:?}"))
///     .build()
///     .unwrap();
///
/// assert_eq!(setup.track_count(), 2);
/// ```
#[must_use]
pub struct SessionSetupBuilder {
    /// Configured tracks, in index order.
    tracks: Vec<TrackSetup>,
    /// Container writer.
    writer: Option<Box<dyn ContainerWriter>>,
    /// Pipeline configuration.
    config: PipelineConfig,
    /// Timestamp source shared by every track.
    clock: Option<Arc<dyn ClockSource>>,
    /// Event callback.
    event_callback: Option<EventCallback>,
}

impl Default for SessionSetupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSetupBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            writer: None,
            config: PipelineConfig::default(),
            clock: None,
            event_callback: None,
        }
    }

    /// Add a track: a capture source and the encoder that compresses it.
    pub fn add_track<S, E>(mut self, source: S, encoder: E) -> Self
    where
        S: CaptureSource + 'static,
        E: Encoder + 'static,
    {
        self.tracks.push(TrackSetup {
            source: Box::new(source),
            encoder: Box::new(encoder),
        });
        self
    }

    /// Set the container writer every track is multiplexed into.
    pub fn container<W: ContainerWriter + 'static>(mut self, writer: W) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Set custom pipeline configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the clock presentation timestamps are read from.
    ///
    /// Default: a [`MonotonicClock`] created when the session is built, shared
    /// by every track.
    pub fn with_clock<C: ClockSource + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Set a callback to receive runtime events.
    ///
    /// Events include format registration, container open, rejected input
    /// slots, track end-of-stream, and session close or abort.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Returns the number of tracks added so far.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Validates the builder configuration.
    fn validate(&self) -> Result<(), CaptureError> {
        if self.tracks.is_empty() {
            return Err(CaptureError::NoTracksConfigured);
        }
        if self.writer.is_none() {
            return Err(CaptureError::NoContainerConfigured);
        }
        self.config.validate()
    }

    /// Validates the configuration and produces a [`SessionSetup`].
    ///
    /// # Errors
    ///
    /// Returns an error if no tracks were added, no container writer was
    /// set, or the configuration is out of range.
    pub fn build(self) -> Result<SessionSetup, CaptureError> {
        self.validate()?;

        let writer = self.writer.ok_or(CaptureError::NoContainerConfigured)?;
        Ok(SessionSetup {
            tracks: self.tracks,
            writer,
            config: self.config,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            events: self.event_callback,
        })
    }
}

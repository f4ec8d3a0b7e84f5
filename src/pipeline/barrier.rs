//! One-time container open gate.

use crate::chunk::EncodedSample;
use crate::encoder::TrackFormat;
use crate::event::EventCallback;
use crate::mux::ContainerWriter;
use crate::{CaptureError, PipelineEvent};

/// Owns the container writer and opens it exactly once, after every track
/// has registered its output format.
///
/// `registered` only grows and `open` only goes from `false` to `true`, and
/// only when `registered == total`. Samples offered before that are refused
/// without touching the writer.
pub(crate) struct MuxBarrier {
    writer: Box<dyn ContainerWriter>,
    total: usize,
    registered: usize,
    open: bool,
    stopped: bool,
    events: Option<EventCallback>,
}

impl MuxBarrier {
    pub fn new(
        writer: Box<dyn ContainerWriter>,
        total: usize,
        events: Option<EventCallback>,
    ) -> Self {
        Self {
            writer,
            total,
            registered: 0,
            open: false,
            stopped: false,
            events,
        }
    }

    pub fn registered(&self) -> usize {
        self.registered
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Adds `track`'s format to the container and returns the container
    /// track index it was assigned.
    pub fn register_format(
        &mut self,
        track: usize,
        format: &TrackFormat,
    ) -> Result<usize, CaptureError> {
        let container_track = self.writer.add_track(format)?;
        self.registered += 1;

        tracing::info!(
            track,
            container_track,
            registered = self.registered,
            total = self.total,
            mime = %format.audio.mime,
            "track format registered"
        );
        self.emit(PipelineEvent::TrackFormatRegistered {
            track,
            container_track,
            registered: self.registered,
            total: self.total,
        });
        Ok(container_track)
    }

    /// Starts the container once every track has registered.
    ///
    /// Returns `true` if this call opened it.
    pub fn maybe_open(&mut self) -> Result<bool, CaptureError> {
        if self.registered < self.total {
            return Ok(false);
        }
        if self.open {
            return Err(CaptureError::ContainerAlreadyOpen);
        }

        self.writer.start()?;
        self.open = true;
        tracing::info!(
            writer = self.writer.name(),
            tracks = self.total,
            "container opened"
        );
        self.emit(PipelineEvent::ContainerOpened { tracks: self.total });
        Ok(true)
    }

    /// Writes a sample if the container is open. Returns whether it was
    /// written.
    pub fn write(
        &mut self,
        container_track: usize,
        sample: &EncodedSample<'_>,
    ) -> Result<bool, CaptureError> {
        if !self.open {
            return Ok(false);
        }
        self.writer.write_sample(container_track, sample)?;
        Ok(true)
    }

    /// Stops the writer. Later calls do nothing.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        if std::mem::replace(&mut self.stopped, true) {
            return Ok(());
        }
        if !self.open {
            tracing::warn!(
                writer = self.writer.name(),
                registered = self.registered,
                total = self.total,
                "stopping container that never started"
            );
        }
        self.writer.stop()?;
        Ok(())
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(cb) = &self.events {
            cb(event);
        }
    }
}

impl Drop for MuxBarrier {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::warn!("container stop failed during teardown: {}", e);
        }
    }
}

//! Tokio mpsc channel container writer.

use tokio::sync::mpsc;

use crate::chunk::{EncodedSample, OwnedSample};
use crate::encoder::TrackFormat;
use crate::mux::ContainerWriter;
use crate::ContainerError;

/// An encoded sample tagged with its container track index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSample {
    /// Container track index.
    pub track: usize,
    /// The copied sample.
    pub sample: OwnedSample,
}

/// A container writer that forwards samples to a tokio mpsc channel.
///
/// This is the way to hand encoded audio to async code (a network uploader,
/// a live muxer). The capture loop runs on its own thread, so sends block
/// that thread when the channel is full rather than dropping samples. The
/// sender is dropped on `stop()`, which ends the receiver's stream.
///
/// # Example
///
/// ```
/// use multitrack_capture::{ChannelWriter, TrackSample};
/// use tokio::sync::mpsc;
///
/// let (tx, mut rx) = mpsc::channel::<TrackSample>(64);
/// let writer = ChannelWriter::new(tx);
///
/// // Use writer with SessionSetup::builder()...
/// // Then receive samples:
/// // while let Some(sample) = rx.recv().await { ... }
/// ```
#[derive(Debug)]
pub struct ChannelWriter {
    name: String,
    sender: Option<mpsc::Sender<TrackSample>>,
    formats: Vec<TrackFormat>,
    started: bool,
}

impl ChannelWriter {
    /// Creates a new channel writer with the given sender.
    ///
    /// Size the channel for the consumer's worst-case stall: a full channel
    /// stalls every track of the session.
    pub fn new(sender: mpsc::Sender<TrackSample>) -> Self {
        Self::with_name("channel", sender)
    }

    /// Creates a new channel writer with a custom name.
    pub fn with_name(name: impl Into<String>, sender: mpsc::Sender<TrackSample>) -> Self {
        Self {
            name: name.into(),
            sender: Some(sender),
            formats: Vec::new(),
            started: false,
        }
    }

    /// Returns the formats registered so far, indexed by container track.
    pub fn formats(&self) -> &[TrackFormat] {
        &self.formats
    }
}

impl ContainerWriter for ChannelWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_track(&mut self, format: &TrackFormat) -> Result<usize, ContainerError> {
        if self.started {
            return Err(ContainerError::TrackAfterStart);
        }
        self.formats.push(format.clone());
        Ok(self.formats.len() - 1)
    }

    fn start(&mut self) -> Result<(), ContainerError> {
        if self.started {
            return Err(ContainerError::AlreadyStarted);
        }
        self.started = true;
        Ok(())
    }

    fn write_sample(
        &mut self,
        track: usize,
        sample: &EncodedSample<'_>,
    ) -> Result<(), ContainerError> {
        if !self.started {
            return Err(ContainerError::NotStarted);
        }
        if track >= self.formats.len() {
            return Err(ContainerError::UnknownTrack { track });
        }
        let sender = self.sender.as_ref().ok_or(ContainerError::ChannelClosed)?;

        tracing::trace!(
            "ChannelWriter {}: track {} sample of {} bytes, pts={}",
            self.name,
            track,
            sample.size(),
            sample.pts_us
        );
        sender
            .blocking_send(TrackSample {
                track,
                sample: sample.to_owned_sample(),
            })
            .map_err(|_| ContainerError::ChannelClosed)
    }

    fn stop(&mut self) -> Result<(), ContainerError> {
        self.sender = None;
        self.started = false;
        Ok(())
    }
}

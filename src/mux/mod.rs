//! Container writer trait and implementations.
//!
//! A [`ContainerWriter`] multiplexes the encoded tracks of one session into a
//! single destination. The crate provides three writers:
//!
//! - [`FileWriter`]: Writes a single-file multitrack container
//! - [`ChannelWriter`]: Forwards samples to a tokio mpsc channel
//! - [`MemoryWriter`]: Records every call, for tests and inspection
//!
//! You can implement the [`ContainerWriter`] trait for real container
//! formats (MP4, Matroska) backed by your muxer of choice.

mod channel;
mod file;
mod memory;

pub use channel::{ChannelWriter, TrackSample};
pub use file::FileWriter;
pub use memory::{MemoryWriter, MuxCall, MuxLog};

use crate::chunk::EncodedSample;
use crate::encoder::TrackFormat;
use crate::ContainerError;

/// A multitrack container destination.
///
/// The capture loop drives a writer through a fixed sequence: one
/// `add_track` per session track (in the order their formats become known),
/// exactly one `start`, any number of `write_sample` calls, then `stop`.
///
/// # Implementation Notes
///
/// - Methods are called from the capture loop thread, one at a time
/// - `add_track` returns the index the container assigned; the pipeline
///   records it and never assumes it equals the pipeline track index
/// - `stop` is called once at the end of every session, including sessions
///   where `start` was never reached
///
/// # Example
///
/// ```
/// use multitrack_capture::{ContainerError, ContainerWriter, EncodedSample, TrackFormat};
///
/// struct CountingWriter {
///     tracks: usize,
///     samples: usize,
/// }
///
/// impl ContainerWriter for CountingWriter {
///     fn name(&self) -> &str {
///         "counting"
///     }
///
///     fn add_track(&mut self, _format: &TrackFormat) -> Result<usize, ContainerError> {
///         self.tracks += 1;
///         Ok(self.tracks - 1)
///     }
///
///     fn start(&mut self) -> Result<(), ContainerError> {
///         Ok(())
///     }
///
///     fn write_sample(&mut self, _track: usize, _sample: &EncodedSample<'_>) -> Result<(), ContainerError> {
///         self.samples += 1;
///         Ok(())
///     }
///
///     fn stop(&mut self) -> Result<(), ContainerError> {
///         Ok(())
///     }
/// }
/// ```
pub trait ContainerWriter: Send {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Registers a track and returns its container track index.
    fn add_track(&mut self, format: &TrackFormat) -> Result<usize, ContainerError>;

    /// Starts the container. Called once, after every track was added.
    fn start(&mut self) -> Result<(), ContainerError>;

    /// Writes one encoded sample to a container track.
    fn write_sample(
        &mut self,
        track: usize,
        sample: &EncodedSample<'_>,
    ) -> Result<(), ContainerError>;

    /// Finalizes the container and releases its resources.
    fn stop(&mut self) -> Result<(), ContainerError>;
}

impl<W: ContainerWriter + ?Sized> ContainerWriter for Box<W> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn add_track(&mut self, format: &TrackFormat) -> Result<usize, ContainerError> {
        (**self).add_track(format)
    }

    fn start(&mut self) -> Result<(), ContainerError> {
        (**self).start()
    }

    fn write_sample(
        &mut self,
        track: usize,
        sample: &EncodedSample<'_>,
    ) -> Result<(), ContainerError> {
        (**self).write_sample(track, sample)
    }

    fn stop(&mut self) -> Result<(), ContainerError> {
        (**self).stop()
    }
}

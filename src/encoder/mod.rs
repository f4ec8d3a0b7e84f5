//! Encoder contract.
//!
//! An [`Encoder`] compresses one track. It exposes a slot-based queue API:
//! the pipeline borrows an input slot, fills it, submits it, and later polls
//! compressed output slots that it must release after use. Both sides use
//! bounded waits so the single capture loop never blocks indefinitely.
//!
//! [`PcmEncoder`] is a software implementation that frames raw PCM without
//! compressing it; it is used by tests and demos and documents the contract
//! by example.

mod pcm;

pub use pcm::PcmEncoder;

use std::time::Duration;

use crate::config::AudioFormat;
use crate::EncoderError;

/// Handle to an encoder input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputSlot(pub usize);

/// Handle to an encoder output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputSlot(pub usize);

/// Metadata for a ready output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputInfo {
    /// Slot holding the payload.
    pub slot: OutputSlot,
    /// Valid payload bytes in the slot.
    pub size: usize,
    /// Timestamp the encoder attached, in microseconds.
    pub pts_us: u64,
    /// Whether this is the encoder's final output.
    pub end_of_stream: bool,
}

/// Result of polling an encoder's output queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPoll {
    /// A compressed output slot is ready.
    Ready(OutputInfo),
    /// Nothing is ready within the timeout.
    TryAgain,
    /// The output format is now known; read it with
    /// [`Encoder::current_output_format`].
    FormatChanged,
}

/// The output format of one encoded track, as registered with the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFormat {
    /// Stream parameters.
    pub audio: AudioFormat,
    /// Codec-specific configuration bytes (e.g. an AAC AudioSpecificConfig).
    pub codec_config: Vec<u8>,
}

impl TrackFormat {
    /// Creates a format with no codec configuration bytes.
    pub fn new(audio: AudioFormat) -> Self {
        Self {
            audio,
            codec_config: Vec::new(),
        }
    }
}

/// A per-track audio encoder.
///
/// Methods are called from the capture loop thread, one at a time. Timeouts
/// are upper bounds: an implementation may return earlier.
pub trait Encoder: Send {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Prepares the encoder. Errors here prevent the session from starting.
    fn start(&mut self) -> Result<(), EncoderError>;

    /// Releases the encoder. Called once per session.
    fn stop(&mut self) -> Result<(), EncoderError>;

    /// Waits up to `timeout` for a free input slot. `Ok(None)` means the
    /// encoder is transiently full.
    fn request_input_slot(&mut self, timeout: Duration) -> Result<Option<InputSlot>, EncoderError>;

    /// Returns the writable buffer behind a dequeued input slot.
    fn input_buffer(&mut self, slot: InputSlot) -> Option<&mut [u8]>;

    /// Queues `len` bytes of the slot for encoding.
    fn submit_input(
        &mut self,
        slot: InputSlot,
        len: usize,
        pts_us: u64,
        end_of_stream: bool,
    ) -> Result<(), EncoderError>;

    /// Waits up to `timeout` for compressed output or a format change.
    fn poll_output(&mut self, timeout: Duration) -> Result<OutputPoll, EncoderError>;

    /// Returns the payload behind a ready output slot.
    fn output_buffer(&self, slot: OutputSlot) -> Option<&[u8]>;

    /// Returns an output slot to the encoder.
    fn release_output(&mut self, slot: OutputSlot) -> Result<(), EncoderError>;

    /// Returns the output format announced by [`OutputPoll::FormatChanged`].
    fn current_output_format(&self) -> Result<TrackFormat, EncoderError>;
}

impl<E: Encoder + ?Sized> Encoder for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&mut self) -> Result<(), EncoderError> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<(), EncoderError> {
        (**self).stop()
    }

    fn request_input_slot(&mut self, timeout: Duration) -> Result<Option<InputSlot>, EncoderError> {
        (**self).request_input_slot(timeout)
    }

    fn input_buffer(&mut self, slot: InputSlot) -> Option<&mut [u8]> {
        (**self).input_buffer(slot)
    }

    fn submit_input(
        &mut self,
        slot: InputSlot,
        len: usize,
        pts_us: u64,
        end_of_stream: bool,
    ) -> Result<(), EncoderError> {
        (**self).submit_input(slot, len, pts_us, end_of_stream)
    }

    fn poll_output(&mut self, timeout: Duration) -> Result<OutputPoll, EncoderError> {
        (**self).poll_output(timeout)
    }

    fn output_buffer(&self, slot: OutputSlot) -> Option<&[u8]> {
        (**self).output_buffer(slot)
    }

    fn release_output(&mut self, slot: OutputSlot) -> Result<(), EncoderError> {
        (**self).release_output(slot)
    }

    fn current_output_format(&self) -> Result<TrackFormat, EncoderError> {
        (**self).current_output_format()
    }
}

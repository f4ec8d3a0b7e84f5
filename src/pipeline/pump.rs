//! Feeds raw bytes or end-of-stream into a track's encoder.

use std::time::Duration;

use crate::encoder::{Encoder, InputSlot};
use crate::event::EventCallback;
use crate::pipeline::SessionFlags;
use crate::{EncoderError, PipelineEvent};

/// What to hand the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpInput<'a> {
    /// Raw bytes. May be empty on a track's first cycle.
    Chunk(&'a [u8]),
    /// Ask the encoder to finish the stream.
    EndOfStream,
}

/// Per-track admission loop into an encoder's input queue.
pub(crate) struct EncodePump {
    input_timeout: Duration,
    events: Option<EventCallback>,
}

impl EncodePump {
    pub fn new(input_timeout: Duration, events: Option<EventCallback>) -> Self {
        Self {
            input_timeout,
            events,
        }
    }

    /// Submits `input` to the encoder, retrying until a slot is accepted or
    /// the session stops capturing.
    ///
    /// Rejected slots are reported and retried, never fatal. On an accepted
    /// end-of-stream submission `eos_requested` is set. Returns whether the
    /// input was submitted.
    pub fn feed(
        &self,
        track: usize,
        encoder: &mut dyn Encoder,
        eos_requested: &mut bool,
        input: PumpInput<'_>,
        pts_us: u64,
        flags: &SessionFlags,
    ) -> bool {
        while flags.is_capturing() {
            let slot = match encoder.request_input_slot(self.input_timeout) {
                Ok(Some(slot)) => slot,
                Ok(None) => {
                    tracing::trace!(track, "no input slot available, retrying");
                    continue;
                }
                Err(e) => {
                    self.reject(track, &e);
                    continue;
                }
            };

            match Self::submit(encoder, slot, input, pts_us) {
                Ok(()) => {
                    if input == PumpInput::EndOfStream {
                        *eos_requested = true;
                        tracing::debug!(track, pts_us, "end of stream submitted");
                    }
                    return true;
                }
                Err(e) => self.reject(track, &e),
            }
        }

        tracing::debug!(track, "capture ended before input was submitted");
        false
    }

    fn submit(
        encoder: &mut dyn Encoder,
        slot: InputSlot,
        input: PumpInput<'_>,
        pts_us: u64,
    ) -> Result<(), EncoderError> {
        match input {
            PumpInput::Chunk(bytes) => {
                let buf = encoder
                    .input_buffer(slot)
                    .ok_or(EncoderError::InvalidSlot { slot: slot.0 })?;
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                encoder.submit_input(slot, len, pts_us, false)
            }
            PumpInput::EndOfStream => encoder.submit_input(slot, 0, pts_us, true),
        }
    }

    fn reject(&self, track: usize, err: &EncoderError) {
        tracing::warn!(track, "encoder rejected input slot: {}", err);
        if let Some(cb) = &self.events {
            cb(PipelineEvent::InputRejected {
                track,
                reason: err.to_string(),
            });
        }
    }
}

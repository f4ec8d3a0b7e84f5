//! Software PCM "encoder" that frames raw samples without compressing them.

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::AudioFormat;
use crate::encoder::{Encoder, InputSlot, OutputInfo, OutputPoll, OutputSlot, TrackFormat};
use crate::probe::LifecycleProbe;
use crate::EncoderError;

/// Samples per channel in one output frame, matching an AAC access unit.
const FRAME_SAMPLES: usize = 1024;

/// Default number of input and output slots.
const DEFAULT_SLOTS: usize = 4;

#[derive(Debug)]
struct Packet {
    data: Vec<u8>,
    pts_us: u64,
    end_of_stream: bool,
}

/// An [`Encoder`] that re-frames 16-bit PCM into fixed-size packets.
///
/// Input bytes accumulate until a full frame (1024 samples per channel) is
/// available, which gives the encoder a latency window like a real codec:
/// the tail of the stream only comes out after end-of-stream is submitted.
/// The output format is announced on the first output poll, or after
/// [`with_format_delay`](Self::with_format_delay) empty polls.
///
/// All waits return immediately; there is no background thread.
///
/// # Example
///
/// ```
/// use multitrack_capture::{AudioFormat, Encoder, OutputPoll, PcmEncoder};
/// use std::time::Duration;
///
/// let mut encoder = PcmEncoder::new(AudioFormat::pcm_s16le(16000, 1));
/// encoder.start().unwrap();
/// assert_eq!(encoder.poll_output(Duration::ZERO).unwrap(), OutputPoll::FormatChanged);
/// ```
#[derive(Debug)]
pub struct PcmEncoder {
    name: String,
    format: AudioFormat,
    frame_bytes: usize,
    slot_capacity: usize,
    running: bool,
    format_delay: u32,
    format_delay_remaining: u32,
    format_announced: bool,
    eos_received: bool,
    reject_inputs: u32,
    held_inputs: u32,
    inputs: Vec<Vec<u8>>,
    free_inputs: VecDeque<usize>,
    dequeued: Vec<bool>,
    accum: Vec<u8>,
    accum_pts: Option<u64>,
    pending: VecDeque<Packet>,
    outputs: Vec<Option<Packet>>,
    free_outputs: VecDeque<usize>,
    probe: LifecycleProbe,
}

impl PcmEncoder {
    /// Creates an encoder for the given PCM input format.
    pub fn new(format: AudioFormat) -> Self {
        let frame_bytes = FRAME_SAMPLES * format.channels.max(1) as usize * 2;
        Self {
            name: "pcm".to_string(),
            format,
            frame_bytes,
            slot_capacity: 16 * 1024,
            running: false,
            format_delay: 0,
            format_delay_remaining: 0,
            format_announced: false,
            eos_received: false,
            reject_inputs: 0,
            held_inputs: 0,
            inputs: Vec::new(),
            free_inputs: VecDeque::new(),
            dequeued: Vec::new(),
            accum: Vec::new(),
            accum_pts: None,
            pending: VecDeque::new(),
            outputs: Vec::new(),
            free_outputs: VecDeque::new(),
            probe: LifecycleProbe::new(),
        }
        .with_slots(DEFAULT_SLOTS)
    }

    /// Sets the name reported to the pipeline.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the number of input and output slots.
    pub fn with_slots(mut self, slots: usize) -> Self {
        let slots = slots.max(1);
        self.inputs = vec![vec![0; self.slot_capacity]; slots];
        self.dequeued = vec![false; slots];
        self.outputs = (0..slots).map(|_| None).collect();
        self
    }

    /// Sets the capacity of each input slot in bytes.
    pub fn with_slot_capacity(mut self, bytes: usize) -> Self {
        self.slot_capacity = bytes.max(2);
        let slots = self.inputs.len();
        self.with_slots(slots)
    }

    /// Sets the size of one output frame in bytes.
    pub fn with_frame_bytes(mut self, bytes: usize) -> Self {
        self.frame_bytes = bytes.max(1);
        self
    }

    /// Answers this many output polls with `TryAgain` before announcing the
    /// output format.
    pub fn with_format_delay(mut self, polls: u32) -> Self {
        self.format_delay = polls;
        self
    }

    /// Makes the next `count` input slot requests fail with
    /// [`EncoderError::InvalidSlot`].
    pub fn reject_next_inputs(&mut self, count: u32) {
        self.reject_inputs = count;
    }

    /// Makes the next `count` input slot requests find no free slot, as if
    /// the encoder were still busy with earlier input.
    pub fn hold_next_inputs(&mut self, count: u32) {
        self.held_inputs = count;
    }

    /// Returns a probe counting `start()`/`stop()` calls.
    pub fn probe(&self) -> LifecycleProbe {
        self.probe.clone()
    }

    fn ensure_running(&self) -> Result<(), EncoderError> {
        if self.running {
            Ok(())
        } else {
            Err(EncoderError::NotRunning)
        }
    }

    fn emit_frames(&mut self, pts_us: u64) {
        while self.accum.len() >= self.frame_bytes {
            let rest = self.accum.split_off(self.frame_bytes);
            let data = std::mem::replace(&mut self.accum, rest);
            self.pending.push_back(Packet {
                data,
                pts_us: self.accum_pts.unwrap_or(0),
                end_of_stream: false,
            });
            // Leftover bytes belong to the input that just arrived
            self.accum_pts = Some(pts_us);
        }
        if self.accum.is_empty() {
            self.accum_pts = None;
        }
    }
}

impl Encoder for PcmEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), EncoderError> {
        self.running = true;
        self.format_announced = false;
        self.format_delay_remaining = self.format_delay;
        self.eos_received = false;
        self.free_inputs = (0..self.inputs.len()).collect();
        self.dequeued.fill(false);
        self.free_outputs = (0..self.outputs.len()).collect();
        self.outputs.iter_mut().for_each(|slot| *slot = None);
        self.accum.clear();
        self.accum_pts = None;
        self.pending.clear();
        self.probe.record_start();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EncoderError> {
        self.running = false;
        self.probe.record_stop();
        Ok(())
    }

    fn request_input_slot(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<InputSlot>, EncoderError> {
        self.ensure_running()?;
        if self.reject_inputs > 0 {
            self.reject_inputs -= 1;
            return Err(EncoderError::InvalidSlot { slot: usize::MAX });
        }
        if self.eos_received {
            return Err(EncoderError::InputAfterEndOfStream);
        }
        if self.held_inputs > 0 {
            self.held_inputs -= 1;
            return Ok(None);
        }

        Ok(self.free_inputs.pop_front().map(|index| {
            self.dequeued[index] = true;
            InputSlot(index)
        }))
    }

    fn input_buffer(&mut self, slot: InputSlot) -> Option<&mut [u8]> {
        if !self.dequeued.get(slot.0).copied().unwrap_or(false) {
            return None;
        }
        self.inputs.get_mut(slot.0).map(Vec::as_mut_slice)
    }

    fn submit_input(
        &mut self,
        slot: InputSlot,
        len: usize,
        pts_us: u64,
        end_of_stream: bool,
    ) -> Result<(), EncoderError> {
        self.ensure_running()?;
        if !self.dequeued.get(slot.0).copied().unwrap_or(false) {
            return Err(EncoderError::InvalidSlot { slot: slot.0 });
        }

        let len = len.min(self.inputs[slot.0].len());
        if len > 0 {
            self.accum_pts.get_or_insert(pts_us);
            self.accum.extend_from_slice(&self.inputs[slot.0][..len]);
            self.emit_frames(pts_us);
        }

        self.dequeued[slot.0] = false;
        self.free_inputs.push_back(slot.0);

        if end_of_stream {
            self.eos_received = true;
            if !self.accum.is_empty() {
                self.pending.push_back(Packet {
                    data: std::mem::take(&mut self.accum),
                    pts_us: self.accum_pts.take().unwrap_or(pts_us),
                    end_of_stream: false,
                });
            }
            self.pending.push_back(Packet {
                data: Vec::new(),
                pts_us,
                end_of_stream: true,
            });
        }
        Ok(())
    }

    fn poll_output(&mut self, _timeout: Duration) -> Result<OutputPoll, EncoderError> {
        self.ensure_running()?;

        if !self.format_announced {
            if self.format_delay_remaining > 0 {
                self.format_delay_remaining -= 1;
                return Ok(OutputPoll::TryAgain);
            }
            self.format_announced = true;
            return Ok(OutputPoll::FormatChanged);
        }

        if self.pending.is_empty() {
            return Ok(OutputPoll::TryAgain);
        }
        let Some(index) = self.free_outputs.pop_front() else {
            return Ok(OutputPoll::TryAgain);
        };
        let Some(packet) = self.pending.pop_front() else {
            self.free_outputs.push_front(index);
            return Ok(OutputPoll::TryAgain);
        };

        let info = OutputInfo {
            slot: OutputSlot(index),
            size: packet.data.len(),
            pts_us: packet.pts_us,
            end_of_stream: packet.end_of_stream,
        };
        self.outputs[index] = Some(packet);
        Ok(OutputPoll::Ready(info))
    }

    fn output_buffer(&self, slot: OutputSlot) -> Option<&[u8]> {
        self.outputs
            .get(slot.0)
            .and_then(Option::as_ref)
            .map(|packet| packet.data.as_slice())
    }

    fn release_output(&mut self, slot: OutputSlot) -> Result<(), EncoderError> {
        let released = self.outputs.get_mut(slot.0).and_then(Option::take);
        if released.is_none() {
            return Err(EncoderError::InvalidSlot { slot: slot.0 });
        }
        self.free_outputs.push_back(slot.0);
        Ok(())
    }

    fn current_output_format(&self) -> Result<TrackFormat, EncoderError> {
        if !self.format_announced {
            return Err(EncoderError::FormatUnavailable);
        }
        Ok(TrackFormat::new(self.format.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Duration = Duration::ZERO;

    fn started(frame_bytes: usize) -> PcmEncoder {
        let mut encoder =
            PcmEncoder::new(AudioFormat::pcm_s16le(16000, 1)).with_frame_bytes(frame_bytes);
        encoder.start().unwrap();
        assert_eq!(encoder.poll_output(T).unwrap(), OutputPoll::FormatChanged);
        encoder
    }

    fn feed(encoder: &mut PcmEncoder, bytes: &[u8], pts: u64, eos: bool) {
        let slot = encoder.request_input_slot(T).unwrap().unwrap();
        encoder.input_buffer(slot).unwrap()[..bytes.len()].copy_from_slice(bytes);
        encoder.submit_input(slot, bytes.len(), pts, eos).unwrap();
    }

    fn next_ready(encoder: &mut PcmEncoder) -> OutputInfo {
        match encoder.poll_output(T).unwrap() {
            OutputPoll::Ready(info) => info,
            other => panic!("expected ready output, got {other:?}"),
        }
    }

    #[test]
    fn test_not_running_rejects_calls() {
        let mut encoder = PcmEncoder::new(AudioFormat::pcm_s16le(16000, 1));
        assert!(matches!(
            encoder.request_input_slot(T),
            Err(EncoderError::NotRunning)
        ));
        assert!(matches!(
            encoder.poll_output(T),
            Err(EncoderError::NotRunning)
        ));
    }

    #[test]
    fn test_held_inputs_report_no_slot() {
        let mut encoder = started(4);
        encoder.hold_next_inputs(2);
        assert_eq!(encoder.request_input_slot(T).unwrap(), None);
        assert_eq!(encoder.request_input_slot(T).unwrap(), None);
        assert!(encoder.request_input_slot(T).unwrap().is_some());
    }

    #[test]
    fn test_format_delay() {
        let mut encoder = PcmEncoder::new(AudioFormat::pcm_s16le(16000, 1)).with_format_delay(2);
        encoder.start().unwrap();
        assert!(encoder.current_output_format().is_err());
        assert_eq!(encoder.poll_output(T).unwrap(), OutputPoll::TryAgain);
        assert_eq!(encoder.poll_output(T).unwrap(), OutputPoll::TryAgain);
        assert_eq!(encoder.poll_output(T).unwrap(), OutputPoll::FormatChanged);
        let format = encoder.current_output_format().unwrap();
        assert_eq!(format.audio.sample_rate, 16000);
    }

    #[test]
    fn test_frames_are_held_until_full() {
        let mut encoder = started(4);
        feed(&mut encoder, &[1, 2], 10, false);
        assert_eq!(encoder.poll_output(T).unwrap(), OutputPoll::TryAgain);

        feed(&mut encoder, &[3, 4, 5], 20, false);
        let info = next_ready(&mut encoder);
        assert_eq!(info.size, 4);
        assert_eq!(info.pts_us, 10);
        assert_eq!(encoder.output_buffer(info.slot).unwrap(), &[1, 2, 3, 4]);
        encoder.release_output(info.slot).unwrap();
    }

    #[test]
    fn test_end_of_stream_flushes_tail() {
        let mut encoder = started(4);
        feed(&mut encoder, &[1, 2], 10, false);
        feed(&mut encoder, &[], 30, true);

        let tail = next_ready(&mut encoder);
        assert_eq!(tail.size, 2);
        assert!(!tail.end_of_stream);
        encoder.release_output(tail.slot).unwrap();

        let eos = next_ready(&mut encoder);
        assert_eq!(eos.size, 0);
        assert!(eos.end_of_stream);
        encoder.release_output(eos.slot).unwrap();

        assert!(matches!(
            encoder.request_input_slot(T),
            Err(EncoderError::InputAfterEndOfStream)
        ));
    }

    #[test]
    fn test_output_slots_are_bounded() {
        let mut encoder = PcmEncoder::new(AudioFormat::pcm_s16le(16000, 1))
            .with_frame_bytes(2)
            .with_slots(1);
        encoder.start().unwrap();
        encoder.poll_output(T).unwrap();
        feed(&mut encoder, &[1, 2, 3, 4], 0, false);

        let first = next_ready(&mut encoder);
        // The only output slot is still held.
        assert_eq!(encoder.poll_output(T).unwrap(), OutputPoll::TryAgain);
        encoder.release_output(first.slot).unwrap();
        assert!(matches!(encoder.poll_output(T).unwrap(), OutputPoll::Ready(_)));
    }

    #[test]
    fn test_release_unknown_slot_fails() {
        let mut encoder = started(4);
        assert!(matches!(
            encoder.release_output(OutputSlot(0)),
            Err(EncoderError::InvalidSlot { slot: 0 })
        ));
    }

    #[test]
    fn test_rejected_inputs_then_recovers() {
        let mut encoder = started(4);
        encoder.reject_next_inputs(1);
        assert!(encoder.request_input_slot(T).is_err());
        assert!(encoder.request_input_slot(T).unwrap().is_some());
    }

    #[test]
    fn test_probe_counts_lifecycle() {
        let mut encoder = PcmEncoder::new(AudioFormat::pcm_s16le(16000, 1));
        let probe = encoder.probe();
        encoder.start().unwrap();
        encoder.stop().unwrap();
        assert_eq!(probe.starts(), 1);
        assert_eq!(probe.stops(), 1);
    }
}

//! Mock capture source for testing without hardware.

use std::collections::VecDeque;
use std::time::Duration;

use ringbuf::traits::Producer;

use crate::probe::LifecycleProbe;
use crate::source::{ring_source, CaptureSource, RingSource};

#[derive(Debug)]
enum Segment {
    Samples(VecDeque<i16>),
    Stall(u32),
}

/// A scripted capture source that plays back synthetic audio.
///
/// Audio is appended with the `generate_*` methods; [`stall`](Self::stall)
/// inserts reads that return no data, which is how tests model a device
/// that is momentarily dry. Reads never return more than
/// [`with_read_size`](Self::with_read_size) bytes.
///
/// # Example
///
/// ```
/// use multitrack_capture::{CaptureSource, MockSource};
///
/// let mut mock = MockSource::new(16000, 1).with_read_size(64);
/// mock.stall(1);
/// mock.generate_sine(440.0, 10);
///
/// let mut buf = [0u8; 256];
/// assert_eq!(mock.read(&mut buf), 0);
/// assert_eq!(mock.read(&mut buf), 64);
/// ```
#[derive(Debug)]
pub struct MockSource {
    name: String,
    sample_rate: u32,
    channels: u16,
    read_size: usize,
    script: VecDeque<Segment>,
    reads: u64,
    probe: LifecycleProbe,
}

impl MockSource {
    /// Creates a new mock source with the given format.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            name: "mock".to_string(),
            sample_rate,
            channels,
            read_size: usize::MAX,
            script: VecDeque::new(),
            reads: 0,
            probe: LifecycleProbe::new(),
        }
    }

    /// Creates a mock source at 44.1kHz mono.
    pub fn mono_44k() -> Self {
        Self::new(44_100, 1)
    }

    /// Sets the name reported to the pipeline.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Limits how many bytes a single read returns.
    pub fn with_read_size(mut self, bytes: usize) -> Self {
        self.read_size = bytes.max(2);
        self
    }

    /// Returns a probe counting `start()`/`stop()` calls.
    pub fn probe(&self) -> LifecycleProbe {
        self.probe.clone()
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns the number of reads served so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Queues `reads` reads that return no data.
    pub fn stall(&mut self, reads: u32) {
        if reads > 0 {
            self.script.push_back(Segment::Stall(reads));
        }
    }

    /// Generates silence for the given duration in milliseconds.
    pub fn generate_silence(&mut self, duration_ms: u64) {
        let num_samples = self.samples_for_duration(duration_ms);
        self.add_samples(&vec![0i16; num_samples]);
    }

    /// Generates a sine wave at the given frequency for the given duration.
    pub fn generate_sine(&mut self, frequency: f64, duration_ms: u64) {
        let num_frames = self.samples_for_duration(duration_ms) / self.channels as usize;
        let sample_rate = f64::from(self.sample_rate);

        let mut samples = Vec::with_capacity(num_frames * self.channels as usize);
        for i in 0..num_frames {
            let t = i as f64 / sample_rate;
            let value = (2.0 * std::f64::consts::PI * frequency * t).sin();
            let sample = (value * 32767.0) as i16;

            // Write same sample to all channels
            for _ in 0..self.channels {
                samples.push(sample);
            }
        }
        self.add_samples(&samples);
    }

    /// Generates white noise for the given duration.
    pub fn generate_noise(&mut self, duration_ms: u64, amplitude: f64) {
        let num_samples = self.samples_for_duration(duration_ms);
        let amplitude = (amplitude * 32767.0) as i16;

        // Simple LCG for deterministic "random" noise
        let mut seed: u32 = 12345;
        let mut samples = Vec::with_capacity(num_samples);
        for _ in 0..num_samples {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let random = ((seed >> 16) as i32 - 32768) as i16;
            samples.push((i32::from(random) * i32::from(amplitude) / 32767) as i16);
        }
        self.add_samples(&samples);
    }

    /// Adds raw samples directly.
    pub fn add_samples(&mut self, samples: &[i16]) {
        if let Some(Segment::Samples(tail)) = self.script.back_mut() {
            tail.extend(samples.iter().copied());
        } else if !samples.is_empty() {
            self.script
                .push_back(Segment::Samples(samples.iter().copied().collect()));
        }
    }

    /// Returns the number of samples not yet read.
    pub fn remaining_samples(&self) -> usize {
        self.script
            .iter()
            .map(|segment| match segment {
                Segment::Samples(samples) => samples.len(),
                Segment::Stall(_) => 0,
            })
            .sum()
    }

    /// Returns the duration of audio not yet read.
    pub fn duration(&self) -> Duration {
        let frames = self.remaining_samples() / self.channels as usize;
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// Moves the scripted audio into a [`RingSource`], dropping stalls.
    pub fn into_ring_source(self) -> RingSource {
        let capacity = self.remaining_samples().max(1024);
        let (mut producer, source) = ring_source(self.name, capacity);
        for segment in self.script {
            if let Segment::Samples(samples) = segment {
                let (head, tail) = samples.as_slices();
                producer.push_slice(head);
                producer.push_slice(tail);
            }
        }
        source
    }

    fn samples_for_duration(&self, duration_ms: u64) -> usize {
        let frames = (self.sample_rate as u64 * duration_ms / 1000) as usize;
        frames * self.channels as usize
    }
}

impl CaptureSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), crate::SourceError> {
        self.probe.record_start();
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.reads += 1;
        let limit = buf.len().min(self.read_size) / 2;

        let Some(front) = self.script.front_mut() else {
            return 0;
        };

        match front {
            Segment::Stall(remaining) => {
                *remaining -= 1;
                if *remaining == 0 {
                    self.script.pop_front();
                }
                0
            }
            Segment::Samples(samples) => {
                let count = limit.min(samples.len());
                for (dst, sample) in buf.chunks_exact_mut(2).zip(samples.drain(..count)) {
                    dst.copy_from_slice(&sample.to_le_bytes());
                }
                if samples.is_empty() {
                    self.script.pop_front();
                }
                count * 2
            }
        }
    }

    fn stop(&mut self) -> Result<(), crate::SourceError> {
        self.probe.record_stop();
        Ok(())
    }
}

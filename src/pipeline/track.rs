//! Per-track pipeline state.

use std::sync::Arc;

use crate::chunk::RawChunk;
use crate::clock::{ClockSource, TimestampClock};
use crate::encoder::Encoder;
use crate::pipeline::DrainState;
use crate::source::CaptureSource;
use crate::{CaptureError, TrackReport};

/// One capture source, its encoder, and everything the loop knows about them.
///
/// Tracks are created together at setup and owned exclusively by the capture
/// loop. Dropping a track stops whatever collaborator is still running, so a
/// session torn down by a panic or a failed spawn still releases devices.
pub(crate) struct Track {
    pub index: usize,
    pub source: Box<dyn CaptureSource>,
    pub encoder: Box<dyn Encoder>,
    pub clock: TimestampClock,
    pub chunk: RawChunk,
    pub eos_requested: bool,
    pub drain_state: DrainState,
    /// Index the container assigned at registration.
    pub container_track: Option<usize>,
    pub first_cycle: bool,
    pub samples_written: u64,
    pub bytes_written: u64,
    source_running: bool,
    encoder_running: bool,
}

impl Track {
    pub fn new(
        index: usize,
        source: Box<dyn CaptureSource>,
        encoder: Box<dyn Encoder>,
        clock: Arc<dyn ClockSource>,
        chunk_bytes: usize,
    ) -> Self {
        Self {
            index,
            source,
            encoder,
            clock: TimestampClock::new(clock),
            chunk: RawChunk::with_capacity(chunk_bytes),
            eos_requested: false,
            drain_state: DrainState::AwaitingFormat,
            container_track: None,
            first_cycle: true,
            samples_written: 0,
            bytes_written: 0,
            source_running: false,
            encoder_running: false,
        }
    }

    /// Starts the source, then the encoder.
    ///
    /// If the encoder fails the source is stopped again before returning.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.source
            .start()
            .map_err(|source| CaptureError::SourceStartFailed {
                track: self.index,
                source_name: self.source.name().to_string(),
                source,
            })?;
        self.source_running = true;

        if let Err(source) = self.encoder.start() {
            self.stop_source();
            return Err(CaptureError::EncoderStartFailed {
                track: self.index,
                encoder_name: self.encoder.name().to_string(),
                source,
            });
        }
        self.encoder_running = true;

        tracing::debug!(
            track = self.index,
            source = self.source.name(),
            encoder = self.encoder.name(),
            "track started"
        );
        Ok(())
    }

    /// Reads one chunk from the source into the track's own buffer.
    pub fn read_chunk(&mut self) -> usize {
        let source = &mut self.source;
        self.chunk
            .fill_with(|buf| Ok::<_, std::convert::Infallible>(source.read(buf)))
            .unwrap_or(0)
    }

    /// Stops the capture source if it is still running.
    pub fn stop_source(&mut self) {
        if !std::mem::replace(&mut self.source_running, false) {
            return;
        }
        if let Err(e) = self.source.stop() {
            tracing::warn!(
                track = self.index,
                source = self.source.name(),
                "source stop failed: {}",
                e
            );
        }
    }

    /// Stops the encoder if it is still running.
    pub fn stop_encoder(&mut self) {
        if !std::mem::replace(&mut self.encoder_running, false) {
            return;
        }
        if let Err(e) = self.encoder.stop() {
            tracing::warn!(
                track = self.index,
                encoder = self.encoder.name(),
                "encoder stop failed: {}",
                e
            );
        }
    }

    pub fn report(&self) -> TrackReport {
        TrackReport {
            track: self.index,
            container_track: self.container_track,
            samples_written: self.samples_written,
            bytes_written: self.bytes_written,
            last_pts_us: self.clock.last(),
        }
    }
}

impl Drop for Track {
    fn drop(&mut self) {
        self.stop_source();
        self.stop_encoder();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioFormat, MockSource, PcmEncoder, SourceError};

    fn track(source: impl CaptureSource + 'static) -> (Track, crate::LifecycleProbe) {
        let encoder = PcmEncoder::new(AudioFormat::pcm_s16le(16_000, 1));
        let probe = encoder.probe();
        let clock: Arc<dyn ClockSource> = Arc::new(|| 0u64);
        (
            Track::new(0, Box::new(source), Box::new(encoder), clock, 8),
            probe,
        )
    }

    struct FailingSource;

    impl CaptureSource for FailingSource {
        fn name(&self) -> &str {
            "broken"
        }

        fn start(&mut self) -> Result<(), SourceError> {
            Err(SourceError::NoDefaultDevice)
        }

        fn read(&mut self, _buf: &mut [u8]) -> usize {
            0
        }
    }

    #[test]
    fn test_read_chunk_uses_own_buffer() {
        let mut mock = MockSource::new(16_000, 1);
        mock.add_samples(&[1, 2, 3, 4, 5, 6]);
        let (mut track, _) = track(mock);

        // Buffer holds 8 bytes, so only 4 samples fit
        assert_eq!(track.read_chunk(), 8);
        assert_eq!(track.chunk.as_bytes(), &[1, 0, 2, 0, 3, 0, 4, 0]);
        assert_eq!(track.read_chunk(), 4);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mock = MockSource::mono_44k();
        let source_probe = mock.probe();
        let (mut track, encoder_probe) = track(mock);

        track.start().unwrap();
        track.stop_source();
        track.stop_source();
        track.stop_encoder();
        drop(track);

        assert_eq!(source_probe.stops(), 1);
        assert_eq!(encoder_probe.stops(), 1);
    }

    #[test]
    fn test_drop_stops_running_collaborators() {
        let mock = MockSource::mono_44k();
        let source_probe = mock.probe();
        let (mut track, encoder_probe) = track(mock);

        track.start().unwrap();
        drop(track);

        assert_eq!(source_probe.stops(), 1);
        assert_eq!(encoder_probe.stops(), 1);
    }

    #[test]
    fn test_failed_source_start() {
        let (mut track, encoder_probe) = track(FailingSource);
        let err = track.start().unwrap_err();
        assert!(matches!(err, CaptureError::SourceStartFailed { track: 0, .. }));
        drop(track);

        // Encoder was never started, so it is never stopped
        assert_eq!(encoder_probe.starts(), 0);
        assert_eq!(encoder_probe.stops(), 0);
    }
}

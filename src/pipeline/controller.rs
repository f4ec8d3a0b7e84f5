//! The capture loop, flush, and abort paths.

use std::sync::Arc;
use std::time::Duration;

use crate::builder::SessionSetup;
use crate::event::EventCallback;
use crate::pipeline::{
    DrainOutcome, DrainState, DrainStation, EncodePump, MuxBarrier, PumpInput, SessionFlags,
    StreamingTracks, Track,
};
use crate::{CaptureError, PipelineEvent, SessionReport};

/// Owns every track and the container for one session.
///
/// Created on the caller's thread so collaborator start failures surface
/// synchronously, then moved onto the capture loop thread by
/// [`run`](Self::run).
pub(crate) struct PipelineController {
    tracks: Vec<Track>,
    barrier: MuxBarrier,
    streaming: StreamingTracks,
    pump: EncodePump,
    drain: DrainStation,
    idle_backoff: Duration,
    flags: Arc<SessionFlags>,
    events: Option<EventCallback>,
}

impl PipelineController {
    pub fn new(setup: SessionSetup, flags: Arc<SessionFlags>) -> Self {
        let SessionSetup {
            tracks,
            writer,
            config,
            clock,
            events,
        } = setup;

        let total = tracks.len();
        let tracks = tracks
            .into_iter()
            .enumerate()
            .map(|(index, track)| {
                Track::new(
                    index,
                    track.source,
                    track.encoder,
                    Arc::clone(&clock),
                    config.chunk_bytes,
                )
            })
            .collect();

        Self {
            tracks,
            barrier: MuxBarrier::new(writer, total, events.clone()),
            streaming: StreamingTracks::new(total),
            pump: EncodePump::new(config.input_timeout, events.clone()),
            drain: DrainStation::new(config.output_timeout, config.max_idle_polls, events.clone()),
            idle_backoff: config.idle_backoff,
            flags,
            events,
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Starts every source and encoder in track order.
    ///
    /// On failure, everything already started is stopped again and the
    /// session never enters capturing.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        for i in 0..self.tracks.len() {
            if let Err(err) = self.tracks[i].start() {
                tracing::error!(track = i, "track failed to start: {}", err);
                for started in &mut self.tracks[..i] {
                    started.stop_source();
                    started.stop_encoder();
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Runs the capture loop, then flushes every track and closes the
    /// container. A fatal error aborts the session instead.
    pub fn run(mut self) -> Result<SessionReport, CaptureError> {
        tracing::info!(tracks = self.tracks.len(), "capture loop started");

        let result = self.capture().and_then(|()| self.flush());
        self.flags.set_capturing(false);

        match result {
            Ok(()) => {
                let report = self.report();
                tracing::info!(
                    samples = report.samples_written(),
                    "recording session closed"
                );
                self.emit(PipelineEvent::SessionClosed);
                Ok(report)
            }
            Err(err) => {
                self.abort(&err);
                Err(err)
            }
        }
    }

    fn capture(&mut self) -> Result<(), CaptureError> {
        let flags = Arc::clone(&self.flags);

        while !flags.stop_requested() && flags.is_capturing() {
            let mut any_read = false;

            for track in &mut self.tracks {
                if track.drain_state == DrainState::StreamEnded {
                    continue;
                }

                let read = track.read_chunk();
                if read == 0 && !track.first_cycle {
                    continue;
                }
                any_read |= read > 0;
                track.first_cycle = false;

                let pts_us = track.clock.next();
                tracing::trace!(track = track.index, read, pts_us, "feeding chunk");
                self.pump.feed(
                    track.index,
                    &mut *track.encoder,
                    &mut track.eos_requested,
                    PumpInput::Chunk(track.chunk.as_bytes()),
                    pts_us,
                    &flags,
                );
                self.drain
                    .drain(track, &mut self.barrier, &mut self.streaming, &flags)?;
            }

            if !any_read && !self.idle_backoff.is_zero() {
                std::thread::sleep(self.idle_backoff);
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CaptureError> {
        let flags = Arc::clone(&self.flags);
        tracing::info!(
            streaming = self.streaming.remaining(),
            "stop requested, flushing tracks"
        );

        for track in &mut self.tracks {
            if track.drain_state != DrainState::StreamEnded {
                let pts_us = track.clock.next();
                self.pump.feed(
                    track.index,
                    &mut *track.encoder,
                    &mut track.eos_requested,
                    PumpInput::EndOfStream,
                    pts_us,
                    &flags,
                );

                if track.eos_requested {
                    while self
                        .drain
                        .drain(track, &mut self.barrier, &mut self.streaming, &flags)?
                        != DrainOutcome::Ended
                    {}
                } else {
                    tracing::warn!(track = track.index, "end of stream was not submitted");
                }
            }

            track.stop_source();
            track.stop_encoder();
        }

        self.barrier.stop()
    }

    fn abort(&mut self, err: &CaptureError) {
        tracing::error!(
            registered = self.barrier.registered(),
            container_open = self.barrier.is_open(),
            "aborting recording session: {}",
            err
        );

        for track in &mut self.tracks {
            track.stop_source();
            track.stop_encoder();
        }
        if let Err(e) = self.barrier.stop() {
            tracing::warn!("container stop failed during abort: {}", e);
        }
        self.flags.set_capturing(false);

        self.emit(PipelineEvent::SessionAborted {
            reason: err.to_string(),
        });
    }

    fn report(&self) -> SessionReport {
        SessionReport {
            tracks: self.tracks.iter().map(Track::report).collect(),
            container_opened: self.barrier.is_open(),
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(cb) = &self.events {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AudioFormat, CaptureSource, MemoryWriter, MockSource, PcmEncoder, PipelineConfig,
        SourceError,
    };

    fn pcm() -> PcmEncoder {
        PcmEncoder::new(AudioFormat::pcm_s16le(16_000, 1)).with_frame_bytes(64)
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            input_timeout: Duration::ZERO,
            output_timeout: Duration::ZERO,
            idle_backoff: Duration::ZERO,
            chunk_bytes: 32,
            ..Default::default()
        }
    }

    fn capturing_flags() -> Arc<SessionFlags> {
        let flags = Arc::new(SessionFlags::new());
        flags.set_capturing(true);
        flags
    }

    struct FailingSource;

    impl CaptureSource for FailingSource {
        fn name(&self) -> &str {
            "unplugged"
        }

        fn start(&mut self) -> Result<(), SourceError> {
            Err(SourceError::DeviceNotFound {
                name: "unplugged".to_string(),
            })
        }

        fn read(&mut self, _buf: &mut [u8]) -> usize {
            0
        }
    }

    #[test]
    fn test_start_failure_stops_started_tracks() {
        let first = MockSource::mono_44k();
        let first_probe = first.probe();
        let encoder = pcm();
        let encoder_probe = encoder.probe();

        let setup = SessionSetup::builder()
            .add_track(first, encoder)
            .add_track(FailingSource, pcm())
            .container(MemoryWriter::new())
            .with_config(config())
            .build()
            .unwrap();

        let mut controller = PipelineController::new(setup, Arc::new(SessionFlags::new()));
        let err = controller.start().unwrap_err();
        assert!(matches!(err, CaptureError::SourceStartFailed { track: 1, .. }));

        assert_eq!(first_probe.stops(), 1);
        assert_eq!(encoder_probe.stops(), 1);
        drop(controller);
        assert_eq!(first_probe.stops(), 1);
    }

    #[test]
    fn test_stop_before_any_data_still_flushes() {
        let writer = MemoryWriter::new();
        let log = writer.log();
        let source = MockSource::mono_44k();
        let source_probe = source.probe();

        let setup = SessionSetup::builder()
            .add_track(source, pcm())
            .container(writer)
            .with_config(config())
            .build()
            .unwrap();

        let flags = capturing_flags();
        let mut controller = PipelineController::new(setup, Arc::clone(&flags));
        controller.start().unwrap();
        flags.request_stop();

        let report = controller.run().unwrap();
        assert!(report.container_opened);
        assert_eq!(report.tracks.len(), 1);
        assert_eq!(log.start_count(), 1);
        assert_eq!(log.stop_count(), 1);
        assert_eq!(source_probe.stops(), 1);
        assert!(!flags.is_capturing());
    }

    #[test]
    fn test_capture_writes_audio_then_flushes_tail() {
        let writer = MemoryWriter::new();
        let log = writer.log();
        let mut source = MockSource::new(16_000, 1);
        // 100 samples = 200 bytes: three full 64-byte frames plus an 8-byte tail
        source.add_samples(&[3; 100]);

        let setup = SessionSetup::builder()
            .add_track(source, pcm())
            .container(writer)
            .with_config(config())
            .build()
            .unwrap();

        let flags = capturing_flags();
        let mut controller = PipelineController::new(setup, Arc::clone(&flags));
        controller.start().unwrap();

        // Stop from another thread once the source has been drained
        let stopper = {
            let flags = Arc::clone(&flags);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                flags.request_stop();
            })
        };
        let report = controller.run().unwrap();
        stopper.join().unwrap();

        assert_eq!(report.tracks[0].bytes_written, 200);
        assert_eq!(report.samples_written(), 4);
        assert_eq!(log.write_count(), 4);
    }

    #[test]
    fn test_fatal_error_aborts_and_emits() {
        use parking_lot::Mutex;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let writer = MemoryWriter::new().fail_writes_after(0);
        let log = writer.log();
        let mut source = MockSource::new(16_000, 1);
        source.add_samples(&[1; 64]);
        let source_probe = source.probe();

        let setup = SessionSetup::builder()
            .add_track(source, pcm())
            .container(writer)
            .with_config(config())
            .on_event(move |e| seen_clone.lock().push(e))
            .build()
            .unwrap();

        let flags = capturing_flags();
        let mut controller = PipelineController::new(setup, Arc::clone(&flags));
        controller.start().unwrap();

        let err = controller.run().unwrap_err();
        assert!(matches!(err, CaptureError::Container(_)));
        assert!(!flags.is_capturing());
        assert_eq!(source_probe.stops(), 1);
        assert_eq!(log.stop_count(), 1);
        assert!(seen
            .lock()
            .iter()
            .any(|e| matches!(e, PipelineEvent::SessionAborted { .. })));
    }
}

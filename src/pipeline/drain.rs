//! Pulls compressed output from a track's encoder into the container.

use std::time::Duration;

use crate::chunk::EncodedSample;
use crate::encoder::OutputPoll;
use crate::event::EventCallback;
use crate::pipeline::{MuxBarrier, SessionFlags, StreamingTracks, Track};
use crate::CaptureError;

/// Where a track is in its output lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainState {
    /// The encoder has not announced its output format yet.
    AwaitingFormat,
    /// The format is registered; payloads flow to the container once open.
    Streaming,
    /// The final end-of-stream output was drained. Terminal.
    StreamEnded,
}

/// Why a drain call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainOutcome {
    /// Too many consecutive empty polls; yield to the next track.
    Idle,
    /// The track's format was registered. Other tracks get a turn before
    /// this one is polled again.
    FormatRegistered,
    /// The track reached end-of-stream (now or earlier).
    Ended,
}

/// Per-track output poller.
pub(crate) struct DrainStation {
    output_timeout: Duration,
    max_idle_polls: u32,
    events: Option<EventCallback>,
}

impl DrainStation {
    pub fn new(
        output_timeout: Duration,
        max_idle_polls: u32,
        events: Option<EventCallback>,
    ) -> Self {
        Self {
            output_timeout,
            max_idle_polls,
            events,
        }
    }

    /// Polls `track`'s encoder until it yields, registers its format, or
    /// ends.
    ///
    /// Once the track has requested end-of-stream, empty polls no longer
    /// count toward the idle limit: the call only returns on registration or
    /// end-of-stream.
    pub fn drain(
        &self,
        track: &mut Track,
        barrier: &mut MuxBarrier,
        streaming: &mut StreamingTracks,
        flags: &SessionFlags,
    ) -> Result<DrainOutcome, CaptureError> {
        let mut idle_polls = 0;

        loop {
            if track.drain_state == DrainState::StreamEnded {
                return Ok(DrainOutcome::Ended);
            }

            let poll = track
                .encoder
                .poll_output(self.output_timeout)
                .map_err(|source| CaptureError::Encoder {
                    track: track.index,
                    source,
                })?;

            match poll {
                OutputPoll::TryAgain => {
                    if !track.eos_requested {
                        idle_polls += 1;
                        if idle_polls >= self.max_idle_polls {
                            return Ok(DrainOutcome::Idle);
                        }
                    }
                }
                OutputPoll::FormatChanged => {
                    self.register(track, barrier)?;
                    return Ok(DrainOutcome::FormatRegistered);
                }
                OutputPoll::Ready(info) => {
                    idle_polls = 0;

                    let buf = track.encoder.output_buffer(info.slot).ok_or(
                        CaptureError::MissingOutputBuffer {
                            track: track.index,
                            slot: info.slot.0,
                        },
                    )?;
                    let size = info.size.min(buf.len());

                    if size > 0 {
                        let pts_us = track.clock.next();
                        let written = match track.container_track {
                            Some(container_track) => barrier.write(
                                container_track,
                                &EncodedSample {
                                    payload: &buf[..size],
                                    pts_us,
                                    end_of_stream: info.end_of_stream,
                                },
                            )?,
                            None => false,
                        };

                        if written {
                            track.clock.commit(pts_us);
                            track.samples_written += 1;
                            track.bytes_written += size as u64;
                            tracing::trace!(track = track.index, size, pts_us, "sample written");
                        } else {
                            tracing::debug!(
                                track = track.index,
                                size,
                                "dropping sample produced before the container opened"
                            );
                        }
                    }

                    track
                        .encoder
                        .release_output(info.slot)
                        .map_err(|source| CaptureError::Encoder {
                            track: track.index,
                            source,
                        })?;

                    if info.end_of_stream {
                        track.drain_state = DrainState::StreamEnded;
                        streaming.track_ended(track.index, flags, self.events.as_ref());
                        return Ok(DrainOutcome::Ended);
                    }
                }
            }
        }
    }

    fn register(&self, track: &mut Track, barrier: &mut MuxBarrier) -> Result<(), CaptureError> {
        if track.drain_state != DrainState::AwaitingFormat || track.container_track.is_some() {
            return Err(CaptureError::DuplicateFormat { track: track.index });
        }

        let format = track
            .encoder
            .current_output_format()
            .map_err(|source| CaptureError::Encoder {
                track: track.index,
                source,
            })?;
        let container_track = barrier.register_format(track.index, &format)?;
        track.container_track = Some(container_track);
        track.drain_state = DrainState::Streaming;

        barrier.maybe_open()?;
        Ok(())
    }
}

//! In-memory container writer that records every call.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::chunk::EncodedSample;
use crate::encoder::TrackFormat;
use crate::mux::ContainerWriter;
use crate::ContainerError;

/// One recorded call on a [`MemoryWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxCall {
    /// `add_track` returned `container_track` for `format`.
    AddTrack {
        /// Index the writer assigned.
        container_track: usize,
        /// The registered format.
        format: TrackFormat,
    },
    /// `start` was called.
    Start,
    /// `write_sample` was called.
    Write {
        /// Container track index.
        track: usize,
        /// Presentation timestamp in microseconds.
        pts_us: u64,
        /// Payload size in bytes.
        size: usize,
        /// End-of-stream flag of the sample.
        end_of_stream: bool,
    },
    /// `stop` was called.
    Stop,
}

/// Shared handle to the call log of a [`MemoryWriter`].
///
/// The writer moves into the session; keep a `MuxLog` to inspect what the
/// pipeline did. Cloning is cheap; all clones observe the same log.
#[derive(Debug, Clone, Default)]
pub struct MuxLog {
    calls: Arc<Mutex<Vec<MuxCall>>>,
}

impl MuxLog {
    /// Returns a snapshot of every call in order.
    pub fn calls(&self) -> Vec<MuxCall> {
        self.calls.lock().clone()
    }

    /// Number of `add_track` calls.
    pub fn add_track_count(&self) -> usize {
        self.count(|call| matches!(call, MuxCall::AddTrack { .. }))
    }

    /// Number of `start` calls.
    pub fn start_count(&self) -> usize {
        self.count(|call| matches!(call, MuxCall::Start))
    }

    /// Number of `stop` calls.
    pub fn stop_count(&self) -> usize {
        self.count(|call| matches!(call, MuxCall::Stop))
    }

    /// Number of `write_sample` calls across all tracks.
    pub fn write_count(&self) -> usize {
        self.count(|call| matches!(call, MuxCall::Write { .. }))
    }

    /// PTS values written to one container track, in write order.
    pub fn pts_for(&self, track: usize) -> Vec<u64> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                MuxCall::Write { track: t, pts_us, .. } if *t == track => Some(*pts_us),
                _ => None,
            })
            .collect()
    }

    /// Position of the first `start` call in the log.
    pub fn start_position(&self) -> Option<usize> {
        self.calls
            .lock()
            .iter()
            .position(|call| matches!(call, MuxCall::Start))
    }

    /// Position of the first `write_sample` call in the log.
    pub fn first_write_position(&self) -> Option<usize> {
        self.calls
            .lock()
            .iter()
            .position(|call| matches!(call, MuxCall::Write { .. }))
    }

    fn count(&self, pred: impl Fn(&MuxCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| pred(call)).count()
    }

    fn push(&self, call: MuxCall) {
        self.calls.lock().push(call);
    }
}

/// A container writer that keeps nothing but a log of its calls.
///
/// Besides recording, it enforces the container contract the way a real
/// muxer would: tracks cannot be added after `start`, `start` cannot run
/// twice, and samples are refused before `start` or for unknown tracks.
///
/// # Example
///
/// ```
/// use multitrack_capture::{ContainerWriter, MemoryWriter, MuxCall};
///
/// let mut writer = MemoryWriter::new();
/// let log = writer.log();
/// writer.start().unwrap();
/// writer.stop().unwrap();
/// assert_eq!(log.calls(), vec![MuxCall::Start, MuxCall::Stop]);
/// ```
#[derive(Debug)]
pub struct MemoryWriter {
    name: String,
    log: MuxLog,
    tracks: usize,
    started: bool,
    fail_writes_after: Option<usize>,
    writes: usize,
}

impl MemoryWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            log: MuxLog::default(),
            tracks: 0,
            started: false,
            fail_writes_after: None,
            writes: 0,
        }
    }

    /// Sets the name reported to the pipeline.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Makes every `write_sample` after the first `count` fail.
    pub fn fail_writes_after(mut self, count: usize) -> Self {
        self.fail_writes_after = Some(count);
        self
    }

    /// Returns a handle to the call log.
    pub fn log(&self) -> MuxLog {
        self.log.clone()
    }
}

impl Default for MemoryWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerWriter for MemoryWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_track(&mut self, format: &TrackFormat) -> Result<usize, ContainerError> {
        if self.started {
            return Err(ContainerError::TrackAfterStart);
        }
        let container_track = self.tracks;
        self.tracks += 1;
        self.log.push(MuxCall::AddTrack {
            container_track,
            format: format.clone(),
        });
        Ok(container_track)
    }

    fn start(&mut self) -> Result<(), ContainerError> {
        // Record first so a double start is visible in the log
        self.log.push(MuxCall::Start);
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
        if track >= self.tracks {
            return Err(ContainerError::UnknownTrack { track });
        }
        if self.fail_writes_after.is_some_and(|limit| self.writes >= limit) {
            return Err(ContainerError::custom("injected write failure"));
        }
        self.writes += 1;
        self.log.push(MuxCall::Write {
            track,
            pts_us: sample.pts_us,
            size: sample.size(),
            end_of_stream: sample.end_of_stream,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ContainerError> {
        self.log.push(MuxCall::Stop);
        self.started = false;
        Ok(())
    }
}

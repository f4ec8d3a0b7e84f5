//! # multitrack-capture
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Record N audio sources as N synchronized tracks of one container.
//!
//! `multitrack-capture` pumps raw PCM from every [`CaptureSource`] into its
//! own [`Encoder`], drains the compressed output without letting one track
//! stall the others, and multiplexes everything through a single
//! [`ContainerWriter`]. The container is opened exactly once, after every
//! track has announced its output format, and each track's presentation
//! timestamps never go backwards.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use multitrack_capture::{
//!     AudioFormat, FileWriter, MockSource, PcmEncoder, Recorder, SessionSetup,
//! };
//!
//! # fn main() -> Result<(), multitrack_capture::CaptureError> {
//! let format = AudioFormat::pcm_s16le(44_100, 1);
//! let mut interviewer = MockSource::mono_44k();
//! interviewer.generate_sine(220.0, 2_000);
//! let mut guest = MockSource::mono_44k();
//! guest.generate_sine(330.0, 2_000);
//!
//! let setup = SessionSetup::builder()
//!     .add_track(interviewer, PcmEncoder::new(format.clone()))
//!     .add_track(guest, PcmEncoder::new(format))
//!     .container(FileWriter::new("interview.mtrk"))
//!     .on_event(|e| tracing::info!(?e, "pipeline event"))
//!     .build()?;
//!
//! let recorder = Recorder::new();
//! println!("{}", recorder.start_session(setup)?);
//!
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! println!("{}", recorder.request_stop());
//!
//! let report = recorder.wait()?;
//! println!("wrote {} samples", report.samples_written());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The crate keeps a single execution context for the whole pipeline:
//!
//! - **Capture loop thread**: Services every track round-robin, then flushes
//!   every track in order on stop
//! - **Control surface**: [`Recorder`] shares only two atomic flags and a
//!   phase channel with the loop
//! - **Collaborators**: Sources, encoders, and the container writer are used
//!   sequentially from the loop thread and never need locking
//!
//! All encoder waits are bounded, so a stop request is observed within one
//! cycle even when an encoder stalls.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
mod chunk;
mod clock;
mod config;
pub mod encoder;
mod error;
mod event;
pub mod mux;
mod pipeline;
mod probe;
mod session;
pub mod source;

pub use builder::{SessionSetup, SessionSetupBuilder};
pub use chunk::{EncodedSample, OwnedSample, RawChunk};
pub use clock::{ClockSource, MonotonicClock, TimestampClock};
pub use config::{AudioFormat, PipelineConfig, MIME_AAC, MIME_PCM_S16LE};
pub use encoder::{
    Encoder, InputSlot, OutputInfo, OutputPoll, OutputSlot, PcmEncoder, TrackFormat,
};
pub use error::{CaptureError, ContainerError, EncoderError, SourceError};
pub use event::{event_callback, EventCallback, PipelineEvent};
pub use mux::{
    ChannelWriter, ContainerWriter, FileWriter, MemoryWriter, MuxCall, MuxLog, TrackSample,
};
pub use probe::LifecycleProbe;
pub use session::{ControlStatus, Recorder, SessionPhase, SessionReport, TrackReport};
pub use source::{ring_source, CaptureSource, MockSource, RingSource};

#[cfg(feature = "device")]
pub use source::{default_input_device_name, list_input_devices, DeviceSource};

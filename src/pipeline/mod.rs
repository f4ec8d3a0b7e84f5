//! Capture pipeline components.
//!
//! One capture loop thread services every track in index order:
//!
//! ```text
//! CaptureSource → RawChunk → EncodePump → Encoder → DrainStation → MuxBarrier → ContainerWriter
//! ```
//!
//! - **EncodePump**: Bounded-wait admission of raw bytes (or end-of-stream)
//!   into an encoder input slot
//! - **DrainStation**: Per-track output state machine; registers formats,
//!   stamps PTS, forwards samples, detects end-of-stream
//! - **MuxBarrier**: Opens the container exactly once, after every track
//!   registered
//! - **PipelineController**: The capture loop, the per-track flush on stop,
//!   and the abort path on fatal errors
//!
//! Only [`SessionFlags`] is shared with other threads.

mod barrier;
mod controller;
mod drain;
mod pump;
mod state;
mod track;

pub(crate) use barrier::MuxBarrier;
pub(crate) use controller::PipelineController;
pub(crate) use drain::{DrainOutcome, DrainState, DrainStation};
pub(crate) use pump::{EncodePump, PumpInput};
pub(crate) use state::{SessionFlags, StreamingTracks};
pub(crate) use track::Track;

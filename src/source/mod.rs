//! Capture source abstraction.
//!
//! A [`CaptureSource`] hands raw PCM bytes to the capture loop. The crate
//! ships three sources:
//!
//! - [`MockSource`]: Scripted synthetic audio for tests and demos
//! - [`RingSource`]: Drains a lock-free ring buffer filled by another thread
//! - `DeviceSource` (feature `device`): A CPAL input device

#[cfg(feature = "device")]
mod device;
mod mock;
mod ring;

#[cfg(feature = "device")]
pub use device::{default_input_device_name, list_input_devices, DeviceSource};
pub use mock::MockSource;
pub use ring::{ring_source, RingSource};

use crate::SourceError;

/// A producer of raw PCM bytes for one track.
///
/// All methods are called from the capture loop thread, one at a time.
///
/// # Example
///
/// ```
/// use multitrack_capture::{CaptureSource, SourceError};
///
/// struct Silence;
///
/// impl CaptureSource for Silence {
///     fn name(&self) -> &str {
///         "silence"
///     }
///
///     fn read(&mut self, buf: &mut [u8]) -> usize {
///         buf.fill(0);
///         buf.len()
///     }
/// }
/// ```
pub trait CaptureSource: Send {
    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Called once before the first read.
    ///
    /// Errors here are fatal and prevent the session from starting.
    ///
    /// Default implementation does nothing.
    fn start(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Copies available bytes into `buf` and returns how many were written.
    ///
    /// Must not block indefinitely. `0` means no data is available right now.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Called once when the track has been flushed or the session aborted.
    ///
    /// Errors are logged; the session continues shutting down.
    ///
    /// Default implementation does nothing.
    fn stop(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

impl<S: CaptureSource + ?Sized> CaptureSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&mut self) -> Result<(), SourceError> {
        (**self).start()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        (**self).stop()
    }
}

//! CPAL input device as a capture source.

use std::sync::mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig as CpalStreamConfig};
use ringbuf::traits::{Producer, Split};
use ringbuf::HeapRb;

use crate::source::{CaptureSource, RingSource};
use crate::SourceError;

/// Symmetric i16 max for audio conversion (avoids asymmetric clipping).
const I16_MAX_SYMMETRIC: f32 = i16::MAX as f32;
/// Minimum i16 as f32 for clamping.
const I16_MIN_F32: f32 = i16::MIN as f32;
/// Maximum i16 as f32 for clamping.
const I16_MAX_F32: f32 = i16::MAX as f32;

/// Seconds of audio the ring buffer can hold between capture loop reads.
const RING_SECONDS: usize = 5;

/// Lists all available input devices.
pub fn list_input_devices() -> Result<Vec<String>, SourceError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| SourceError::Backend(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Gets the name of the default input device, if any.
pub fn default_input_device_name() -> Option<String> {
    cpal::default_host()
        .default_input_device()
        .and_then(|d| d.name().ok())
}

struct Running {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
    reader: RingSource,
}

/// A capture source reading from a CPAL input device.
///
/// CPAL streams are not `Send` on every platform, so `start()` builds the
/// stream on a small dedicated thread that keeps it alive until `stop()`.
/// The stream callback pushes 16-bit samples into a ring buffer that
/// [`read`](CaptureSource::read) drains without blocking.
pub struct DeviceSource {
    name: String,
    device: Device,
    running: Option<Running>,
}

impl DeviceSource {
    /// Opens the default input device.
    pub fn open_default() -> Result<Self, SourceError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(SourceError::NoDefaultDevice)?;
        let name = device.name().unwrap_or_else(|_| "default".to_string());
        Ok(Self {
            name,
            device,
            running: None,
        })
    }

    /// Opens a specific input device by name.
    pub fn open_by_name(name: &str) -> Result<Self, SourceError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| SourceError::Backend(e.to_string()))?;

        for device in devices {
            if device.name().is_ok_and(|n| n == name) {
                return Ok(Self {
                    name: name.to_string(),
                    device,
                    running: None,
                });
            }
        }

        Err(SourceError::DeviceNotFound {
            name: name.to_string(),
        })
    }

    /// Returns the device's native capture format (sample rate, channels).
    pub fn native_config(&self) -> Result<(u32, u16), SourceError> {
        let config = self
            .device
            .default_input_config()
            .map_err(|e| SourceError::Backend(e.to_string()))?;
        Ok((config.sample_rate().0, config.channels()))
    }
}

fn build_stream(
    device: &Device,
    mut producer: ringbuf::HeapProd<i16>,
) -> Result<Stream, SourceError> {
    let supported = device
        .default_input_config()
        .map_err(|e| SourceError::Backend(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: CpalStreamConfig = supported.into();
    let on_error = |err: cpal::StreamError| tracing::error!("audio stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                // Non-blocking push - drops samples if the ring is full
                let _ = producer.push_slice(data);
            },
            on_error,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    let converted =
                        (sample * I16_MAX_SYMMETRIC).clamp(I16_MIN_F32, I16_MAX_F32) as i16;
                    let _ = producer.try_push(converted);
                }
            },
            on_error,
            None,
        ),
        format => {
            return Err(SourceError::UnsupportedFormat {
                format: format!("{format:?}"),
            })
        }
    }
    .map_err(|e| SourceError::Backend(e.to_string()))?;

    stream
        .play()
        .map_err(|e| SourceError::Backend(e.to_string()))?;
    Ok(stream)
}

impl CaptureSource for DeviceSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> Result<(), SourceError> {
        let (sample_rate, channels) = self.native_config()?;
        let capacity = sample_rate as usize * channels as usize * RING_SECONDS;
        let (producer, consumer) = HeapRb::<i16>::new(capacity).split();

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), SourceError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let device = self.device.clone();

        let thread = std::thread::Builder::new()
            .name(format!("cpal-{}", self.name))
            .spawn(move || match build_stream(&device, producer) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Hold the stream until stop() or the source is dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| SourceError::Backend(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| SourceError::Backend("capture thread exited".to_string()))??;

        tracing::info!(
            device = %self.name,
            sample_rate,
            channels,
            "device capture started"
        );
        self.running = Some(Running {
            stop_tx,
            thread,
            reader: RingSource::new(self.name.clone(), consumer),
        });
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        match self.running.as_mut() {
            Some(running) => running.reader.read(buf),
            None => 0,
        }
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(());
            running
                .thread
                .join()
                .map_err(|_| SourceError::Backend("capture thread panicked".to_string()))?;
            tracing::info!(device = %self.name, "device capture stopped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices_doesnt_panic() {
        // This may return empty list in CI, but shouldn't panic
        let _ = list_input_devices();
    }

    #[test]
    fn test_default_device_doesnt_panic() {
        let _ = default_input_device_name();
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_default_device_captures() {
        let mut source = DeviceSource::open_default().unwrap();
        source.start().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(200));
        let mut buf = vec![0u8; 4096];
        assert!(source.read(&mut buf) > 0);
        source.stop().unwrap();
    }
}

//! Configuration types for recording sessions.

use std::time::Duration;

/// MIME type for AAC audio in an MPEG-4 container.
pub const MIME_AAC: &str = "audio/mp4a-latm";

/// MIME type for raw little-endian 16-bit PCM.
pub const MIME_PCM_S16LE: &str = "audio/raw";

/// PCM frames held by one default-sized capture chunk.
const CHUNK_FRAMES: usize = 2048;

/// Audio format requested from each track's encoder.
///
/// The presets mirror what capture hardware reliably supports: 44.1kHz is the
/// only sample rate guaranteed to be available on every device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    /// MIME type of the encoded stream.
    pub mime: String,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Target bit rate in bits per second. `0` for uncompressed formats.
    pub bit_rate: u32,
}

impl AudioFormat {
    /// AAC low-complexity, 44.1kHz mono at 64kbps.
    #[must_use]
    pub fn aac_lc_mono() -> Self {
        Self {
            mime: MIME_AAC.to_string(),
            sample_rate: 44_100,
            channels: 1,
            bit_rate: 64_000,
        }
    }

    /// Uncompressed 16-bit little-endian PCM.
    #[must_use]
    pub fn pcm_s16le(sample_rate: u32, channels: u16) -> Self {
        Self {
            mime: MIME_PCM_S16LE.to_string(),
            sample_rate,
            channels,
            bit_rate: 0,
        }
    }

    /// Bytes per second of raw 16-bit PCM input at this rate and channel count.
    #[must_use]
    pub fn pcm_byte_rate(&self) -> usize {
        self.sample_rate as usize * self.pcm_frame_bytes()
    }

    /// Bytes in one raw 16-bit PCM frame (one sample per channel).
    #[must_use]
    pub fn pcm_frame_bytes(&self) -> usize {
        self.channels as usize * 2
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::aac_lc_mono()
    }
}

/// Configuration for the capture pipeline.
///
/// Use [`PipelineConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use multitrack_capture::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig {
///     input_timeout: Duration::from_millis(5),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bounded wait for an encoder input slot.
    ///
    /// Default: 10ms
    pub input_timeout: Duration,

    /// Bounded wait for an encoder output slot.
    ///
    /// Default: 10ms
    pub output_timeout: Duration,

    /// Consecutive empty output polls tolerated before a track yields back to
    /// the capture loop. Ignored once the track has requested end-of-stream.
    ///
    /// Default: 5
    pub max_idle_polls: u32,

    /// Pause after a capture cycle in which no source returned data.
    ///
    /// Default: 1ms
    pub idle_backoff: Duration,

    /// Size of each track's raw capture buffer in bytes. Must hold a whole
    /// number of PCM frames of [`audio`](Self::audio).
    ///
    /// Default: 2048 frames of `audio` (4096 bytes for mono)
    pub chunk_bytes: usize,

    /// Capture format of each track. Its channel count sizes the raw
    /// capture chunk.
    ///
    /// Default: [`AudioFormat::aac_lc_mono()`]
    pub audio: AudioFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_audio(AudioFormat::default())
    }
}

impl PipelineConfig {
    /// Default settings with the capture chunk sized for `audio`.
    #[must_use]
    pub fn for_audio(audio: AudioFormat) -> Self {
        Self {
            input_timeout: Duration::from_millis(10),
            output_timeout: Duration::from_millis(10),
            max_idle_polls: 5,
            idle_backoff: Duration::from_millis(1),
            chunk_bytes: CHUNK_FRAMES * audio.pcm_frame_bytes(),
            audio,
        }
    }

    /// Checks that every value is usable.
    pub(crate) fn validate(&self) -> Result<(), crate::CaptureError> {
        if self.chunk_bytes == 0 {
            return Err(crate::CaptureError::InvalidConfig {
                reason: "chunk_bytes must be greater than zero".to_string(),
            });
        }
        if self.max_idle_polls == 0 {
            return Err(crate::CaptureError::InvalidConfig {
                reason: "max_idle_polls must be at least 1".to_string(),
            });
        }
        if self.audio.sample_rate == 0 || self.audio.channels == 0 {
            return Err(crate::CaptureError::InvalidConfig {
                reason: format!(
                    "audio format {}Hz/{}ch is not capturable",
                    self.audio.sample_rate, self.audio.channels
                ),
            });
        }
        if self.chunk_bytes % self.audio.pcm_frame_bytes() != 0 {
            return Err(crate::CaptureError::InvalidConfig {
                reason: format!(
                    "chunk_bytes {} splits a {}-channel PCM frame",
                    self.chunk_bytes, self.audio.channels
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_aac_preset() {
        let format = AudioFormat::aac_lc_mono();
        assert_eq!(format.mime, "audio/mp4a-latm");
        assert_eq!(format.sample_rate, 44_100);
        assert_eq!(format.channels, 1);
        assert_eq!(format.bit_rate, 64_000);
    }

    #[test]
    fn test_pcm_byte_rate() {
        let format = AudioFormat::pcm_s16le(48_000, 2);
        assert_eq!(format.pcm_byte_rate(), 192_000);
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.input_timeout, Duration::from_millis(10));
        assert_eq!(config.output_timeout, Duration::from_millis(10));
        assert_eq!(config.max_idle_polls, 5);
        assert_eq!(config.idle_backoff, Duration::from_millis(1));
        assert_eq!(config.chunk_bytes, 4096);
        assert_eq!(config.audio, AudioFormat::aac_lc_mono());
    }

    #[test]
    fn test_chunk_size_follows_audio_format() {
        let stereo = PipelineConfig::for_audio(AudioFormat::pcm_s16le(48_000, 2));
        assert_eq!(stereo.chunk_bytes, 8192);
        assert_eq!(stereo.audio.channels, 2);
        assert!(stereo.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_partial_frames() {
        let config = PipelineConfig {
            chunk_bytes: 4098,
            ..PipelineConfig::for_audio(AudioFormat::pcm_s16le(48_000, 2))
        };
        assert!(matches!(
            config.validate(),
            Err(crate::CaptureError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let config = PipelineConfig {
            chunk_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_idle_polls() {
        let config = PipelineConfig {
            max_idle_polls: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(crate::CaptureError::InvalidConfig { .. })
        ));
    }
}

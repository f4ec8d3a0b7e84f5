//! Single-file multitrack container writer.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::chunk::EncodedSample;
use crate::encoder::TrackFormat;
use crate::mux::ContainerWriter;
use crate::ContainerError;

// MTRK layout, all integers little-endian:
//
//   header:  "MTRK" | version u16 | track count u16 | sample count u64
//   tracks:  mime len u16 | mime | sample rate u32 | channels u16 |
//            bit rate u32 | config len u32 | config
//   samples: track u32 | pts u64 | flags u8 | payload len u32 | payload

/// Magic bytes at the start of every file.
const MTRK_MAGIC: &[u8; 4] = b"MTRK";

/// Current layout version.
const MTRK_VERSION: u16 = 1;

/// Byte offset of the sample count field, patched on `stop()`.
const SAMPLE_COUNT_OFFSET: u64 = 8;

/// Sample flag marking the last sample of a track.
const FLAG_END_OF_STREAM: u8 = 0x01;

/// A container writer producing a simple multitrack file.
///
/// The file is created on `start()`, once every track's format is known, and
/// finalized (sample count patched into the header) on `stop()`. A session
/// that stops before the container started leaves no file behind.
///
/// # Example
///
/// ```no_run
/// use multitrack_capture::FileWriter;
///
/// let writer = FileWriter::new("interview.mtrk");
/// // Use with SessionSetup::builder()...
/// ```
#[derive(Debug)]
pub struct FileWriter {
    name: String,
    path: PathBuf,
    formats: Vec<TrackFormat>,
    writer: Option<BufWriter<File>>,
    samples_written: u64,
}

impl FileWriter {
    /// Creates a writer for the given path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            name: format!("file:{}", path.as_ref().display()),
            path: path.as_ref().to_path_buf(),
            formats: Vec::new(),
            writer: None,
            samples_written: 0,
        }
    }

    /// Returns the output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of samples written so far.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Flushes buffered data to disk.
    ///
    /// Note: This does NOT update the sample count - that happens on `stop()`.
    pub fn flush(&mut self) -> Result<(), ContainerError> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| ContainerError::io(&self.path, e))?;
        }
        Ok(())
    }

    /// Writes the header and track table.
    ///
    /// Field lengths were checked by `add_track`.
    fn write_header(writer: &mut BufWriter<File>, formats: &[TrackFormat]) -> std::io::Result<()> {
        writer.write_all(MTRK_MAGIC)?;
        writer.write_all(&MTRK_VERSION.to_le_bytes())?;
        writer.write_all(&(formats.len() as u16).to_le_bytes())?;
        // Sample count placeholder, patched on stop
        writer.write_all(&0u64.to_le_bytes())?;

        for format in formats {
            let mime = format.audio.mime.as_bytes();
            writer.write_all(&(mime.len() as u16).to_le_bytes())?;
            writer.write_all(mime)?;
            writer.write_all(&format.audio.sample_rate.to_le_bytes())?;
            writer.write_all(&format.audio.channels.to_le_bytes())?;
            writer.write_all(&format.audio.bit_rate.to_le_bytes())?;
            writer.write_all(&(format.codec_config.len() as u32).to_le_bytes())?;
            writer.write_all(&format.codec_config)?;
        }
        Ok(())
    }

    fn write_record(
        writer: &mut BufWriter<File>,
        track: u32,
        payload_len: u32,
        sample: &EncodedSample<'_>,
    ) -> std::io::Result<()> {
        let flags = if sample.end_of_stream {
            FLAG_END_OF_STREAM
        } else {
            0
        };
        writer.write_all(&track.to_le_bytes())?;
        writer.write_all(&sample.pts_us.to_le_bytes())?;
        writer.write_all(&[flags])?;
        writer.write_all(&payload_len.to_le_bytes())?;
        writer.write_all(sample.payload)
    }

    /// Seeks back to patch the sample count, then flushes.
    fn finalize(writer: &mut BufWriter<File>, samples: u64) -> std::io::Result<()> {
        writer.seek(SeekFrom::Start(SAMPLE_COUNT_OFFSET))?;
        writer.write_all(&samples.to_le_bytes())?;
        writer.seek(SeekFrom::End(0))?;
        writer.flush()
    }
}

/// An unsigned integer used as an on-disk length prefix.
trait LengthField: TryFrom<usize> {
    const MAX_LEN: u64;
}

impl LengthField for u16 {
    const MAX_LEN: u64 = u16::MAX as u64;
}

impl LengthField for u32 {
    const MAX_LEN: u64 = u32::MAX as u64;
}

/// Converts a byte length into a length prefix, rejecting overflow.
fn field_len<T: LengthField>(field: &'static str, len: usize) -> Result<T, ContainerError> {
    T::try_from(len).map_err(|_| ContainerError::FieldTooLarge {
        field,
        len,
        max: T::MAX_LEN,
    })
}

impl ContainerWriter for FileWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_track(&mut self, format: &TrackFormat) -> Result<usize, ContainerError> {
        if self.writer.is_some() {
            return Err(ContainerError::TrackAfterStart);
        }
        if self.formats.len() >= usize::from(u16::MAX) {
            return Err(ContainerError::custom("too many tracks"));
        }
        field_len::<u16>("mime type", format.audio.mime.len())?;
        field_len::<u32>("codec config", format.codec_config.len())?;
        self.formats.push(format.clone());
        Ok(self.formats.len() - 1)
    }

    fn start(&mut self) -> Result<(), ContainerError> {
        if self.writer.is_some() {
            return Err(ContainerError::AlreadyStarted);
        }

        let file = File::create(&self.path).map_err(|e| ContainerError::io(&self.path, e))?;
        let mut writer = BufWriter::new(file);
        Self::write_header(&mut writer, &self.formats)
            .map_err(|e| ContainerError::io(&self.path, e))?;

        tracing::debug!(
            "FileWriter {}: started with {} tracks",
            self.name,
            self.formats.len()
        );
        self.writer = Some(writer);
        self.samples_written = 0;
        Ok(())
    }

    fn write_sample(
        &mut self,
        track: usize,
        sample: &EncodedSample<'_>,
    ) -> Result<(), ContainerError> {
        if track >= self.formats.len() {
            return Err(ContainerError::UnknownTrack { track });
        }
        let writer = self.writer.as_mut().ok_or(ContainerError::NotStarted)?;

        tracing::trace!(
            "FileWriter {}: track {} sample of {} bytes, pts={}",
            self.name,
            track,
            sample.size(),
            sample.pts_us
        );
        let payload_len = field_len::<u32>("sample payload", sample.payload.len())?;
        Self::write_record(writer, track as u32, payload_len, sample)
            .map_err(|e| ContainerError::io(&self.path, e))?;
        self.samples_written += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ContainerError> {
        if let Some(mut writer) = self.writer.take() {
            Self::finalize(&mut writer, self.samples_written)
                .map_err(|e| ContainerError::io(&self.path, e))?;
            tracing::debug!(
                "FileWriter {}: finalized with {} samples",
                self.name,
                self.samples_written
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AudioFormat;
    use tempfile::tempdir;

    fn sample(payload: &[u8], pts_us: u64, end_of_stream: bool) -> EncodedSample<'_> {
        EncodedSample {
            payload,
            pts_us,
            end_of_stream,
        }
    }

    #[test]
    fn test_file_writer_header_and_tracks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.mtrk");

        let mut writer = FileWriter::new(&path);
        writer
            .add_track(&TrackFormat::new(AudioFormat::aac_lc_mono()))
            .unwrap();
        writer
            .add_track(&TrackFormat::new(AudioFormat::pcm_s16le(48_000, 2)))
            .unwrap();
        writer.start().unwrap();
        writer.stop().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[0..4], b"MTRK");
        assert_eq!(u16::from_le_bytes([data[4], data[5]]), MTRK_VERSION);
        assert_eq!(u16::from_le_bytes([data[6], data[7]]), 2);

        // First track entry starts after the 16-byte header
        let mime_len = u16::from_le_bytes([data[16], data[17]]) as usize;
        assert_eq!(&data[18..18 + mime_len], b"audio/mp4a-latm");
        let rate_at = 18 + mime_len;
        let rate = u32::from_le_bytes([
            data[rate_at],
            data[rate_at + 1],
            data[rate_at + 2],
            data[rate_at + 3],
        ]);
        assert_eq!(rate, 44_100);
    }

    #[test]
    fn test_file_writer_patches_sample_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("count.mtrk");

        let mut writer = FileWriter::new(&path);
        writer
            .add_track(&TrackFormat::new(AudioFormat::pcm_s16le(16_000, 1)))
            .unwrap();
        writer.start().unwrap();
        writer.write_sample(0, &sample(&[1, 2], 0, false)).unwrap();
        writer.write_sample(0, &sample(&[3, 4], 100, false)).unwrap();
        writer.write_sample(0, &sample(&[], 200, true)).unwrap();
        writer.stop().unwrap();

        let data = std::fs::read(&path).unwrap();
        let mut count = [0u8; 8];
        count.copy_from_slice(&data[8..16]);
        assert_eq!(u64::from_le_bytes(count), 3);
    }

    #[test]
    fn test_file_writer_sample_record_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("record.mtrk");

        let mut writer = FileWriter::new(&path);
        writer
            .add_track(&TrackFormat::new(AudioFormat::pcm_s16le(16_000, 1)))
            .unwrap();
        writer.start().unwrap();
        writer
            .write_sample(0, &sample(&[0xaa, 0xbb], 0x0102, true))
            .unwrap();
        writer.stop().unwrap();

        let data = std::fs::read(&path).unwrap();
        // Last record: track(4) pts(8) flags(1) len(4) payload(2)
        let record = &data[data.len() - 19..];
        assert_eq!(&record[0..4], &0u32.to_le_bytes());
        assert_eq!(&record[4..12], &0x0102u64.to_le_bytes());
        assert_eq!(record[12], FLAG_END_OF_STREAM);
        assert_eq!(&record[13..17], &2u32.to_le_bytes());
        assert_eq!(&record[17..], &[0xaa, 0xbb]);
    }

    #[test]
    fn test_file_writer_invalid_path_error() {
        let path = PathBuf::from("/nonexistent/directory/test.mtrk");
        let mut writer = FileWriter::new(&path);
        writer
            .add_track(&TrackFormat::new(AudioFormat::default()))
            .unwrap();

        let err = writer.start().unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_file_writer_stop_before_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("never.mtrk");

        let mut writer = FileWriter::new(&path);
        writer.stop().unwrap();

        // No container was started, so no file exists
        assert!(!path.exists());
    }

    #[test]
    fn test_file_writer_rejects_misuse() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("misuse.mtrk");

        let mut writer = FileWriter::new(&path);
        let format = TrackFormat::new(AudioFormat::default());
        writer.add_track(&format).unwrap();
        assert!(matches!(
            writer.write_sample(0, &sample(&[1], 0, false)),
            Err(ContainerError::NotStarted)
        ));
        writer.start().unwrap();
        assert!(matches!(
            writer.add_track(&format),
            Err(ContainerError::TrackAfterStart)
        ));
        assert!(matches!(writer.start(), Err(ContainerError::AlreadyStarted)));
        assert!(matches!(
            writer.write_sample(1, &sample(&[1], 0, false)),
            Err(ContainerError::UnknownTrack { track: 1 })
        ));
        writer.flush().unwrap();
        writer.stop().unwrap();
    }

    #[test]
    fn test_file_writer_rejects_oversized_mime() {
        let mut writer = FileWriter::new("oversized.mtrk");
        let mut audio = AudioFormat::default();
        audio.mime = "a".repeat(usize::from(u16::MAX) + 1);

        let err = writer.add_track(&TrackFormat::new(audio)).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::FieldTooLarge {
                field: "mime type",
                len: 65_536,
                max: 65_535,
            }
        ));
        assert!(writer.formats.is_empty());
    }

    #[test]
    fn test_field_len_bounds() {
        assert_eq!(field_len::<u16>("mime type", 65_535).unwrap(), u16::MAX);
        assert!(field_len::<u16>("mime type", 65_536).is_err());
        assert_eq!(field_len::<u32>("sample payload", 12).unwrap(), 12);
        #[cfg(target_pointer_width = "64")]
        assert!(matches!(
            field_len::<u32>("sample payload", u32::MAX as usize + 1),
            Err(ContainerError::FieldTooLarge { max, .. }) if max == u64::from(u32::MAX)
        ));
    }

    #[test]
    fn test_file_writer_name() {
        let writer = FileWriter::new("/path/to/rec.mtrk");
        assert_eq!(writer.name(), "file:/path/to/rec.mtrk");
        assert_eq!(writer.path(), Path::new("/path/to/rec.mtrk"));
    }
}

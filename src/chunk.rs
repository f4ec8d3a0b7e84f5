//! Raw and encoded data units flowing through the pipeline.

/// A track's raw capture buffer plus the number of valid bytes in it.
///
/// Each track owns its own `RawChunk`, sized from
/// [`PipelineConfig::chunk_bytes`](crate::PipelineConfig::chunk_bytes). The
/// buffer is reused every cycle for the same track and is never shared with
/// another track.
#[derive(Debug, Clone)]
pub struct RawChunk {
    data: Vec<u8>,
    len: usize,
}

impl RawChunk {
    /// Creates an empty chunk with the given capacity in bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            len: 0,
        }
    }

    /// Fills the chunk from `read`, which receives the whole buffer and
    /// returns the number of bytes it wrote.
    ///
    /// The returned count is clamped to the buffer capacity.
    pub fn fill_with<E>(
        &mut self,
        read: impl FnOnce(&mut [u8]) -> Result<usize, E>,
    ) -> Result<usize, E> {
        let n = read(&mut self.data)?;
        self.len = n.min(self.data.len());
        Ok(self.len)
    }

    /// Returns the valid bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Returns the number of valid bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the chunk holds no valid bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the buffer capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

/// One compressed sample handed to a [`ContainerWriter`](crate::ContainerWriter).
///
/// The payload borrows the encoder's output slot and is only valid for the
/// duration of a single `write_sample` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedSample<'a> {
    /// Compressed bytes.
    pub payload: &'a [u8],
    /// Presentation timestamp in microseconds.
    pub pts_us: u64,
    /// Whether this is the last sample of the track.
    pub end_of_stream: bool,
}

impl EncodedSample<'_> {
    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Copies the sample into an owned value.
    pub fn to_owned_sample(&self) -> OwnedSample {
        OwnedSample {
            payload: self.payload.to_vec(),
            pts_us: self.pts_us,
            end_of_stream: self.end_of_stream,
        }
    }
}

/// An [`EncodedSample`] copied out of the encoder slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedSample {
    /// Compressed bytes.
    pub payload: Vec<u8>,
    /// Presentation timestamp in microseconds.
    pub pts_us: u64,
    /// Whether this is the last sample of the track.
    pub end_of_stream: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_chunk_fill() {
        let mut chunk = RawChunk::with_capacity(8);
        let n = chunk
            .fill_with(|buf| {
                buf[..3].copy_from_slice(&[1, 2, 3]);
                Ok::<_, ()>(3)
            })
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(chunk.as_bytes(), &[1, 2, 3]);
        assert_eq!(chunk.capacity(), 8);
    }

    #[test]
    fn test_raw_chunk_clamps_overlong_read() {
        let mut chunk = RawChunk::with_capacity(4);
        let n = chunk.fill_with(|_| Ok::<_, ()>(100)).unwrap();
        assert_eq!(n, 4);
        assert_eq!(chunk.len(), 4);
    }

    #[test]
    fn test_raw_chunk_empty_read() {
        let mut chunk = RawChunk::with_capacity(4);
        chunk.fill_with(|_| Ok::<_, ()>(0)).unwrap();
        assert!(chunk.is_empty());
        assert!(chunk.as_bytes().is_empty());
    }

    #[test]
    fn test_encoded_sample_to_owned() {
        let bytes = [9u8, 8, 7];
        let sample = EncodedSample {
            payload: &bytes,
            pts_us: 42,
            end_of_stream: true,
        };
        assert_eq!(sample.size(), 3);
        let owned = sample.to_owned_sample();
        assert_eq!(owned.payload, vec![9, 8, 7]);
        assert_eq!(owned.pts_us, 42);
        assert!(owned.end_of_stream);
    }
}

use std::sync::Arc;

use super::DecodeSource;
use crate::format::SampleFormat;

/// PCM data that already lives in memory.
///
/// The data is shared, so cloning a [`MemorySource`] is cheap and every clone
/// has its own cursor.
#[derive(Debug, Clone)]
pub struct MemorySource {
    format: SampleFormat,
    data: Arc<[u8]>,
    position: usize,
}

impl MemorySource {
    /// Creates a new source. Trailing bytes that don't form a whole frame
    /// are not part of the stream.
    #[must_use]
    pub fn new(format: SampleFormat, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            format,
            data: data.into(),
            position: 0,
        }
    }

    /// Creates a source of digital silence with the given number of frames.
    #[must_use]
    pub fn silence(format: SampleFormat, frames: usize) -> Self {
        let silent_byte = match format.bits_per_sample {
            8 => 128,
            _ => 0,
        };
        Self::new(format, vec![silent_byte; format.frames_to_bytes(frames)])
    }
}

impl DecodeSource for MemorySource {
    fn format(&self) -> SampleFormat {
        self.format
    }

    fn size(&self) -> usize {
        self.format.align_down(self.data.len())
    }

    fn position(&self) -> usize {
        self.position
    }

    fn read(&mut self, destination: &mut [u8]) -> usize {
        let count = self.format.align_down(destination.len().min(self.available()));
        destination[..count].copy_from_slice(&self.data[self.position..self.position + count]);
        self.position += count;
        count
    }

    fn seek(&mut self, position: usize) -> usize {
        let position = match position >= self.size() {
            true => 0,
            false => self.format.align_down(position),
        };
        self.position = position;
        position
    }
}

#[cfg(test)]
mod tests {
    use super::MemorySource;
    use crate::decode::DecodeSource;
    use crate::format::SampleFormat;

    const FORMAT: SampleFormat = SampleFormat::new(8_000, 2, 16);

    fn counting_source(frames: usize) -> MemorySource {
        let data: Vec<u8> = (0..FORMAT.frames_to_bytes(frames)).map(|index| index as u8).collect();
        MemorySource::new(FORMAT, data)
    }

    #[test]
    fn reads_are_frame_aligned() {
        let mut source = counting_source(4);
        let mut buffer = [0; 7];

        assert_eq!(source.read(&mut buffer), 4);
        assert_eq!(&buffer[..4], &[0, 1, 2, 3]);
        assert_eq!(source.position(), 4);
    }

    #[test]
    fn reads_stop_at_the_end() {
        let mut source = counting_source(2);
        let mut buffer = [0; 64];

        assert_eq!(source.read(&mut buffer), 8);
        assert!(source.is_end_of_stream());
        assert_eq!(source.read(&mut buffer), 0);
    }

    #[test]
    fn seek_aligns_and_snaps_out_of_range_to_zero() {
        let mut source = counting_source(4);

        assert_eq!(source.seek(6), 4);
        assert_eq!(source.available(), 12);
        assert_eq!(source.seek(16), 0);
        assert_eq!(source.seek(1_000), 0);
    }

    #[test]
    fn trailing_partial_frame_is_ignored() {
        let source = MemorySource::new(FORMAT, vec![0; 10]);
        assert_eq!(source.size(), 8);
    }

    #[test]
    fn silence_uses_the_midpoint_for_unsigned_samples() {
        let mut source = MemorySource::silence(SampleFormat::new(8_000, 1, 8), 3);
        let mut buffer = [0; 3];

        source.read(&mut buffer);
        assert_eq!(buffer, [128; 3]);
    }
}

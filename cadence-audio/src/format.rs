/// Describes the layout of interleaved integer PCM data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleFormat {
    /// Frames per second (in Hz).
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Bits of a single channel sample. One of 8, 16, 24 or 32.
    pub bits_per_sample: u16,
}

impl SampleFormat {
    /// Creates a new [`SampleFormat`].
    #[must_use]
    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Size of a single channel sample in bytes.
    #[must_use]
    pub const fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample / 8) as usize
    }

    /// Size of one frame (a sample for every channel) in bytes.
    ///
    /// Every read from and every offset into a PCM stream is aligned to this.
    #[must_use]
    pub const fn block_align(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Size of one second of audio in bytes.
    #[must_use]
    pub const fn bytes_per_second(&self) -> usize {
        self.block_align() * self.sample_rate as usize
    }

    /// Rounds a byte count down to a whole number of frames.
    #[must_use]
    pub const fn align_down(&self, bytes: usize) -> usize {
        let block_align = self.block_align();
        match block_align {
            0 => 0,
            _ => bytes - bytes % block_align,
        }
    }

    /// Number of whole frames in `bytes`.
    #[must_use]
    pub const fn bytes_to_frames(&self, bytes: usize) -> usize {
        match self.block_align() {
            0 => 0,
            block_align => bytes / block_align,
        }
    }

    /// Size of `frames` frames in bytes.
    #[must_use]
    pub const fn frames_to_bytes(&self, frames: usize) -> usize {
        frames * self.block_align()
    }
}

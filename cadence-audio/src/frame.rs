use std::ops::{Add, AddAssign, Mul, Sub};

use crate::format::SampleFormat;

/// A stereo audio sample.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub(crate) struct Frame {
    /// The sample for the left channel.
    pub(crate) left: f32,
    /// The sample for the right channel.
    pub(crate) right: f32,
}

impl Frame {
    /// A [`Frame`] with both the left and right samples set to `0.0`.
    pub(crate) const ZERO: Frame = Frame { left: 0.0, right: 0.0 };

    #[must_use]
    pub(crate) fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    #[must_use]
    pub(crate) fn from_mono(value: f32) -> Self {
        Self::new(value, value)
    }

    /// Returns the frame mixed down to mono.
    #[must_use]
    pub(crate) fn as_mono(self) -> f32 {
        (self.left + self.right) / 2.0
    }

    /// Decodes the frame starting at the beginning of `bytes`.
    ///
    /// Mono data is duplicated to both channels, channels beyond the second
    /// are ignored.
    #[must_use]
    pub(crate) fn from_pcm(bytes: &[u8], format: SampleFormat) -> Self {
        let bytes_per_sample = format.bytes_per_sample();
        if format.channels == 0 || bytes.len() < format.block_align() {
            return Self::ZERO;
        }

        let left = sample_to_f32(&bytes[..bytes_per_sample]);
        match format.channels {
            1 => Self::from_mono(left),
            _ => Self::new(left, sample_to_f32(&bytes[bytes_per_sample..bytes_per_sample * 2])),
        }
    }
}

/// Converts one little endian integer sample to the range `-1.0..=1.0`.
/// 8-bit PCM is unsigned, every other width is signed.
fn sample_to_f32(sample: &[u8]) -> f32 {
    match *sample {
        [value] => (value as f32 - 128.0) / 128.0,
        [low, high] => i16::from_le_bytes([low, high]) as f32 / 32_768.0,
        [low, middle, high] => (i32::from_le_bytes([0, low, middle, high]) >> 8) as f32 / 8_388_608.0,
        [a, b, c, d] => i32::from_le_bytes([a, b, c, d]) as f32 / 2_147_483_648.0,
        _ => 0.0,
    }
}

impl Add for Frame {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl AddAssign for Frame {
    fn add_assign(&mut self, rhs: Self) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Sub for Frame {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.left - rhs.left, self.right - rhs.right)
    }
}

impl Mul<f32> for Frame {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.left * rhs, self.right * rhs)
    }
}

/// Given a previous frame, a current frame, the two next frames, and a position
/// `x` from 0.0 to 1.0 between the current frame and next frame, get an
/// approximated frame.
///
/// This is the 4-point, 3rd-order Hermite interpolation x-form algorithm from
/// "Polynomial Interpolators for High-Quality Resampling of Oversampled Audio"
/// by Olli Niemitalo, p. 43: http://yehar.com/blog/wp-content/uploads/2009/08/deip.pdf
#[must_use]
pub(crate) fn interpolate_frame(previous: Frame, current: Frame, next_1: Frame, next_2: Frame, fraction: f32) -> Frame {
    let c0 = current;
    let c1 = (next_1 - previous) * 0.5;
    let c2 = previous - current * 2.5 + next_1 * 2.0 - next_2 * 0.5;
    let c3 = (next_2 - previous) * 0.5 + (current - next_1) * 1.5;
    ((c3 * fraction + c2) * fraction + c1) * fraction + c0
}

use std::path::Path;

use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SettingsError;
use crate::format::SampleFormat;

const DEFAULT_MAX_STATIC_BYTES: usize = 16 << 20; // 16 MiB

/// Settings shared by the device and every resource created from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Length of a single streaming chunk in seconds.
    pub chunk_seconds: f32,
    /// Upper bound for the PCM payload of a buffer-mode resource. Longer
    /// sources are truncated.
    pub max_static_bytes: usize,
    /// Size of the device buffer in frames. At 48 kHz 1200 frames take 25 ms.
    pub buffer_size: u32,
    /// Output sample rate of the device.
    pub sample_rate: u32,
    /// Output channel count of the device.
    pub channels: u16,
    /// Maximum number of voices the mixer can hold at once.
    pub voice_capacity: usize,
    /// Capacity of the queue that carries completion events off the audio
    /// thread.
    pub event_capacity: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            chunk_seconds: 1.0,
            max_static_bytes: DEFAULT_MAX_STATIC_BYTES,
            buffer_size: 1200,
            sample_rate: 48_000,
            channels: 2,
            voice_capacity: 128,
            event_capacity: 1024,
        }
    }
}

impl AudioSettings {
    /// Loads the settings from `path`, falling back to the defaults if the
    /// file is missing or malformed.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::load(path.as_ref()).unwrap_or_else(|| {
            debug!(path = %path.as_ref().display(), "failed to load audio settings, using defaults");
            Self::default()
        })
    }

    /// Reads the settings from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Option<Self> {
        debug!(path = %path.as_ref().display(), "loading audio settings");

        std::fs::read_to_string(path).ok().and_then(|data| ron::from_str(&data).ok())
    }

    /// Writes the settings to a RON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        debug!(path = %path.as_ref().display(), "saving audio settings");

        let data = ron::ser::to_string_pretty(self, PrettyConfig::new())?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Number of PCM bytes in one streaming chunk of the given format.
    ///
    /// Always a whole, non-zero number of frames.
    #[must_use]
    pub fn chunk_bytes(&self, format: SampleFormat) -> usize {
        let frames = (format.sample_rate as f64 * self.chunk_seconds.max(0.0) as f64) as usize;
        format.frames_to_bytes(frames.max(1))
    }
}

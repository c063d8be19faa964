//! Communication between the playback engine and the low-level audio API.

#[cfg(all(feature = "cpal", not(target_arch = "wasm32")))]
pub mod cpal;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
#[cfg(any(test, feature = "cpal"))]
mod renderer;
#[cfg(any(test, feature = "cpal"))]
mod storage;

use std::sync::Arc;

#[cfg(any(test, feature = "cpal"))]
pub(crate) use renderer::{EventDispatcher, EventDispatcherController, MixerVoice, Renderer, VoiceController};

use crate::format::SampleFormat;
use crate::settings::AudioSettings;
use crate::voice::{Voice, VoiceEvents};

/// Connects the playback engine to an audio output.
pub trait Backend: Sized + Send + Sync + 'static {
    /// Settings for this backend.
    type Settings;

    /// Errors that can occur when using this backend.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Starts the backend.
    fn setup(settings: Self::Settings, audio_settings: &AudioSettings) -> Result<Self, Self::Error>;

    /// Creates a new voice that plays chunks of the given format.
    ///
    /// `events` receives the completion notifications of the voice.
    fn create_voice(&self, format: SampleFormat, events: Arc<dyn VoiceEvents>) -> Result<Arc<dyn Voice>, Self::Error>;

    /// The sample rate of the output (in Hz).
    fn sample_rate(&self) -> u32;
}

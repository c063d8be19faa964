//! Plays audio using [cpal](https://crates.io/crates/cpal).

mod error;
mod stream_manager;

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{BufferSize, Device, SampleRate, StreamConfig};
pub use error::Error;
use stream_manager::{StreamManager, StreamManagerController};
use tracing::debug;

use crate::backend::{Backend, EventDispatcherController, Renderer, VoiceController};
use crate::format::SampleFormat;
use crate::settings::AudioSettings;
use crate::voice::{Voice, VoiceEvents};

/// Settings for the [`CpalBackend`].
#[derive(Default)]
pub struct CpalBackendSettings {
    /// The output device to use. If [`None`], the default output device is
    /// used and the stream follows the default device when the current one
    /// is disconnected.
    pub device: Option<Device>,
}

/// A backend that uses [cpal](https://crates.io/crates/cpal) to mix every
/// voice into the operating system's audio output.
pub struct CpalBackend {
    sample_rate: u32,
    voice_controller: VoiceController,
    stream_manager_controller: StreamManagerController,
    event_dispatcher_controller: EventDispatcherController,
}

impl Backend for CpalBackend {
    type Error = Error;
    type Settings = CpalBackendSettings;

    fn setup(settings: Self::Settings, audio_settings: &AudioSettings) -> Result<Self, Self::Error> {
        let (device, custom_device) = match settings.device {
            Some(device) => (device, true),
            None => (default_device()?, false),
        };

        let config = stream_config(audio_settings);
        let sample_rate = config.sample_rate.0;

        debug!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "starting cpal backend"
        );

        let (renderer, voice_controller, event_dispatcher) = Renderer::new(audio_settings, sample_rate);
        let stream_manager_controller = StreamManager::start(renderer, device, config, custom_device)?;
        let event_dispatcher_controller = event_dispatcher.start();

        Ok(Self {
            sample_rate,
            voice_controller,
            stream_manager_controller,
            event_dispatcher_controller,
        })
    }

    fn create_voice(&self, format: SampleFormat, events: Arc<dyn VoiceEvents>) -> Result<Arc<dyn Voice>, Self::Error> {
        let voice = self.voice_controller.create_voice(format, events)?;
        Ok(voice)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        self.stream_manager_controller.stop();
        self.event_dispatcher_controller.stop();
    }
}

fn default_device() -> Result<Device, Error> {
    cpal::default_host()
        .default_output_device()
        .ok_or(Error::NoDefaultOutputDevice)
}

fn stream_config(audio_settings: &AudioSettings) -> StreamConfig {
    // The configuration is fixed instead of taken from the device, so a
    // restarted stream on a different device keeps the same output format.
    StreamConfig {
        channels: audio_settings.channels,
        sample_rate: SampleRate(audio_settings.sample_rate),
        buffer_size: BufferSize::Fixed(audio_settings.buffer_size),
    }
}

use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::backend::Backend;
use crate::error::SetupError;
use crate::format::SampleFormat;
use crate::settings::AudioSettings;
use crate::voice::{Voice, VoiceEvents};

struct DeviceShared<B> {
    settings: AudioSettings,
    backend: RwLock<Option<B>>,
}

/// The audio output every [`Resource`](crate::Resource) and
/// [`Listener`](crate::Listener) is created from.
///
/// The handle is cheap to clone. Every clone refers to the same device.
pub struct AudioDevice<B: Backend> {
    shared: Arc<DeviceShared<B>>,
}

impl<B: Backend> Clone for AudioDevice<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: Backend> AudioDevice<B> {
    /// Creates a device that still needs to be
    /// [`initialize`](Self::initialize)d.
    #[must_use]
    pub fn new(settings: AudioSettings) -> Self {
        Self {
            shared: Arc::new(DeviceShared {
                settings,
                backend: RwLock::new(None),
            }),
        }
    }

    /// Starts the backend. Does nothing if the device is already initialized.
    pub fn initialize(&self, backend_settings: B::Settings) -> Result<(), SetupError> {
        let mut backend = self.shared.backend.write().unwrap();

        if backend.is_some() {
            return Ok(());
        }

        let started = B::setup(backend_settings, &self.shared.settings).map_err(|error| SetupError::Backend(Box::new(error)))?;
        debug!(sample_rate = started.sample_rate(), "audio device initialized");
        *backend = Some(started);

        Ok(())
    }

    /// Shuts the backend down. Existing voices stay valid but stop producing
    /// sound.
    pub fn finalize(&self) {
        if self.shared.backend.write().unwrap().take().is_some() {
            debug!("audio device finalized");
        }
    }

    /// Whether the backend is running.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.shared.backend.read().unwrap().is_some()
    }

    /// The settings the device was created with.
    #[must_use]
    pub fn settings(&self) -> &AudioSettings {
        &self.shared.settings
    }

    /// The output sample rate, if the device is initialized.
    #[must_use]
    pub fn sample_rate(&self) -> Option<u32> {
        self.with_backend(B::sample_rate)
    }

    /// Runs `f` with the backend, if the device is initialized.
    pub fn with_backend<R>(&self, f: impl FnOnce(&B) -> R) -> Option<R> {
        self.shared.backend.read().unwrap().as_ref().map(f)
    }

    pub(crate) fn ensure_initialized(&self) -> Result<(), SetupError> {
        match self.is_initialized() {
            true => Ok(()),
            false => Err(SetupError::DeviceNotInitialized),
        }
    }

    pub(crate) fn create_voice(&self, format: SampleFormat, events: Arc<dyn VoiceEvents>) -> Result<Arc<dyn Voice>, SetupError> {
        let backend = self.shared.backend.read().unwrap();
        let backend = backend.as_ref().ok_or(SetupError::DeviceNotInitialized)?;

        debug!(?format, "creating voice");
        backend
            .create_voice(format, events)
            .map_err(|error| SetupError::Backend(Box::new(error)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::AudioDevice;
    use crate::backend::mock::MockBackend;
    use crate::error::SetupError;
    use crate::format::SampleFormat;
    use crate::voice::{ChunkEvent, VoiceEvents};

    struct IgnoreEvents;

    impl VoiceEvents for IgnoreEvents {
        fn on_chunk_consumed(&self, _event: &ChunkEvent) {}

        fn on_stream_end(&self, _event: &ChunkEvent) {}
    }

    #[test]
    fn lifecycle() {
        let device = AudioDevice::<MockBackend>::new(Default::default());
        assert!(!device.is_initialized());
        assert_eq!(device.sample_rate(), None);

        device.initialize(()).unwrap();
        device.initialize(()).unwrap();
        assert!(device.clone().is_initialized());
        assert_eq!(device.sample_rate(), Some(48_000));

        device.finalize();
        assert!(!device.is_initialized());
    }

    #[test]
    fn voices_need_an_initialized_device() {
        let device = AudioDevice::<MockBackend>::new(Default::default());
        let format = SampleFormat::new(44_100, 2, 16);

        let result = device.create_voice(format, Arc::new(IgnoreEvents));
        assert!(matches!(result, Err(SetupError::DeviceNotInitialized)));

        device.initialize(()).unwrap();
        device.create_voice(format, Arc::new(IgnoreEvents)).unwrap();
        assert_eq!(device.with_backend(|backend| backend.voices().len()), Some(1));
    }
}

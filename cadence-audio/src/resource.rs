//! Decoded audio shared between listeners.

mod static_buffer;
mod stream;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use self::static_buffer::StaticBuffer;
use self::stream::Stream;
use crate::backend::Backend;
use crate::chunk::{ListenerId, ResourceId};
use crate::decode::{DecodeSource, open_source};
use crate::device::AudioDevice;
use crate::error::{BindError, LoadError, SetupError};
use crate::format::SampleFormat;
use crate::settings::AudioSettings;
use crate::voice::Voice;

/// How a [`Resource`] keeps its audio in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// The whole sound is decoded on load. Meant for short sounds.
    Static,
    /// Chunks are decoded while playing. Meant for music and speech.
    Streaming,
}

enum ResourceVariant {
    Static(StaticBuffer),
    Streaming(Stream),
}

/// A sound that any number of listeners can play at the same time, each at
/// its own position.
///
/// Every listener playing the resource holds a binding on it. The resource
/// can only be [`unload`](Self::unload)ed once every binding is released.
pub struct Resource {
    id: ResourceId,
    settings: AudioSettings,
    variant: ResourceVariant,
}

impl Resource {
    /// Creates an empty resource. Fails if `device` is not initialized.
    pub fn new<B: Backend>(kind: ResourceKind, device: &AudioDevice<B>) -> Result<Self, SetupError> {
        device.ensure_initialized()?;

        let variant = match kind {
            ResourceKind::Static => ResourceVariant::Static(StaticBuffer::default()),
            ResourceKind::Streaming => ResourceVariant::Streaming(Stream::default()),
        };

        Ok(Self {
            id: ResourceId::next(),
            settings: *device.settings(),
            variant,
        })
    }

    /// Creates a resource and loads the audio file at `path` into it.
    pub fn from_file<B: Backend>(kind: ResourceKind, device: &AudioDevice<B>, path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let resource = Self::new(kind, device)?;
        resource.load(open_source(path)?)?;
        Ok(resource)
    }

    /// Takes the audio from `source`.
    ///
    /// A static resource reads the whole source (up to
    /// [`max_static_bytes`](AudioSettings::max_static_bytes)) right away. A
    /// streaming resource keeps the source open and decodes the first chunk.
    pub fn load(&self, mut source: Box<dyn DecodeSource>) -> Result<(), LoadError> {
        let format = source.format();
        let size = source.size();

        match &self.variant {
            ResourceVariant::Static(buffer) => buffer.load(self.id, source.as_mut(), self.settings.max_static_bytes)?,
            ResourceVariant::Streaming(stream) => stream.load(self.id, source, self.settings.chunk_bytes(format))?,
        }

        debug!(id = ?self.id, kind = ?self.kind(), ?format, size, "loaded resource");
        Ok(())
    }

    /// Releases the audio. Returns `false` while any listener is bound.
    pub fn unload(&self) -> bool {
        let unloaded = match &self.variant {
            ResourceVariant::Static(buffer) => buffer.unload(),
            ResourceVariant::Streaming(stream) => stream.unload(),
        };

        if unloaded {
            debug!(id = ?self.id, "unloaded resource");
        }

        unloaded
    }

    /// Binds `listener` and queues the start of the sound on `voice`.
    ///
    /// Returns `Ok(false)` if the listener is already bound to this
    /// resource.
    pub fn bind(&self, listener: ListenerId, voice: &Arc<dyn Voice>) -> Result<bool, BindError> {
        let bound = match &self.variant {
            ResourceVariant::Static(buffer) => buffer.bind(listener, voice)?,
            ResourceVariant::Streaming(stream) => stream.bind(listener, voice)?,
        };

        if bound {
            debug!(id = ?self.id, ?listener, "bound listener");
        }

        Ok(bound)
    }

    /// Stops `voice`, drops what it has queued and releases the binding.
    /// Returns `false` if the listener wasn't bound.
    pub fn unbind(&self, listener: ListenerId, voice: &Arc<dyn Voice>) -> bool {
        let unbound = match &self.variant {
            ResourceVariant::Static(buffer) => buffer.unbind(listener, voice),
            ResourceVariant::Streaming(stream) => stream.unbind(listener, voice),
        };

        if unbound {
            debug!(id = ?self.id, ?listener, "unbound listener");
        }

        unbound
    }

    /// Moves the binding back to the start of the sound.
    pub fn reset_buffer(&self, listener: ListenerId, voice: &Arc<dyn Voice>) -> bool {
        self.seek(listener, voice, 0)
    }

    /// Moves the binding to `frame`. Positions past the end move it to the
    /// start.
    ///
    /// The voice is stopped and has to be started again.
    pub fn seek(&self, listener: ListenerId, voice: &Arc<dyn Voice>, frame: usize) -> bool {
        debug!(id = ?self.id, ?listener, frame, "seeking");

        match &self.variant {
            ResourceVariant::Static(buffer) => buffer.seek(listener, voice, frame),
            ResourceVariant::Streaming(stream) => stream.seek(listener, voice, frame),
        }
    }

    /// Whether the binding has no more audio to queue.
    ///
    /// The last queued chunk might still be playing.
    #[must_use]
    pub fn is_end_of_stream(&self, listener: ListenerId) -> bool {
        match &self.variant {
            ResourceVariant::Static(_) => true,
            ResourceVariant::Streaming(stream) => stream.is_end_of_stream(listener),
        }
    }

    /// Playback position of the binding in frames.
    #[must_use]
    pub fn playback_position(&self, listener: ListenerId, voice: &Arc<dyn Voice>) -> usize {
        match &self.variant {
            ResourceVariant::Static(_) => voice.cursor(),
            ResourceVariant::Streaming(stream) => stream.playback_position(listener, voice),
        }
    }

    /// Stops `voice` and drops what it has queued, keeping the binding.
    pub(crate) fn halt(&self, listener: ListenerId, voice: &Arc<dyn Voice>) {
        match &self.variant {
            ResourceVariant::Static(buffer) => buffer.halt(listener, voice),
            ResourceVariant::Streaming(stream) => stream.halt(listener, voice),
        }
    }

    /// Queues the next chunk after the front chunk of a streaming binding
    /// finished playing.
    pub(crate) fn stream_next(&self, listener: ListenerId, voice: &Arc<dyn Voice>, generation: u64) -> bool {
        match &self.variant {
            ResourceVariant::Static(_) => false,
            ResourceVariant::Streaming(stream) => stream.stream_next(listener, voice, generation),
        }
    }

    /// Tags every chunk this resource produces.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Whether the resource is static or streaming.
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match &self.variant {
            ResourceVariant::Static(_) => ResourceKind::Static,
            ResourceVariant::Streaming(_) => ResourceKind::Streaming,
        }
    }

    /// Whether chunks are decoded while playing.
    #[must_use]
    pub fn is_stream(&self) -> bool {
        self.kind() == ResourceKind::Streaming
    }

    /// Whether audio was loaded and not unloaded since.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        match &self.variant {
            ResourceVariant::Static(buffer) => buffer.chunk().is_some(),
            ResourceVariant::Streaming(stream) => stream.is_loaded(),
        }
    }

    /// Format of the loaded audio.
    #[must_use]
    pub fn format(&self) -> Option<SampleFormat> {
        match &self.variant {
            ResourceVariant::Static(buffer) => buffer.chunk().map(|chunk| chunk.format()),
            ResourceVariant::Streaming(stream) => stream.format(),
        }
    }

    /// Length of the loaded audio in frames.
    #[must_use]
    pub fn size(&self) -> usize {
        self.format()
            .map_or(0, |format| format.bytes_to_frames(self.size_bytes()))
    }

    /// Length of the loaded audio in PCM bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        match &self.variant {
            ResourceVariant::Static(buffer) => buffer.chunk().map_or(0, |chunk| chunk.len()),
            ResourceVariant::Streaming(stream) => stream.size(),
        }
    }

    /// Number of listeners bound to this resource.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        match &self.variant {
            ResourceVariant::Static(buffer) => buffer.reference_count(),
            ResourceVariant::Streaming(stream) => stream.reference_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Resource, ResourceKind};
    use crate::AudioSettings;
    use crate::backend::mock::{MockBackend, MockVoice};
    use crate::chunk::ListenerId;
    use crate::decode::MemorySource;
    use crate::device::AudioDevice;
    use crate::error::{BindError, FromFileError, LoadError, SetupError};
    use crate::format::SampleFormat;
    use crate::voice::Voice;

    const FORMAT: SampleFormat = SampleFormat::new(44_100, 2, 16);

    fn device(settings: AudioSettings) -> AudioDevice<MockBackend> {
        let device = AudioDevice::new(settings);
        device.initialize(()).unwrap();
        device
    }

    fn loaded(kind: ResourceKind, seconds: usize) -> Resource {
        let resource = Resource::new(kind, &device(Default::default())).unwrap();
        resource
            .load(Box::new(MemorySource::silence(FORMAT, FORMAT.sample_rate as usize * seconds)))
            .unwrap();
        resource
    }

    fn voice() -> (Arc<MockVoice>, Arc<dyn Voice>) {
        let mock = MockVoice::detached(FORMAT);
        let voice: Arc<dyn Voice> = mock.clone();
        (mock, voice)
    }

    #[test]
    fn needs_an_initialized_device() {
        let device = AudioDevice::<MockBackend>::new(Default::default());
        let result = Resource::new(ResourceKind::Static, &device);
        assert!(matches!(result, Err(SetupError::DeviceNotInitialized)));
    }

    #[test]
    fn loading_twice_fails() {
        let resource = loaded(ResourceKind::Streaming, 1);
        let result = resource.load(Box::new(MemorySource::silence(FORMAT, 10)));
        assert!(matches!(result, Err(LoadError::AlreadyLoaded)));
    }

    #[test]
    fn empty_sources_are_rejected() {
        for kind in [ResourceKind::Static, ResourceKind::Streaming] {
            let resource = Resource::new(kind, &device(Default::default())).unwrap();
            let result = resource.load(Box::new(MemorySource::new(FORMAT, Vec::new())));

            assert!(matches!(result, Err(LoadError::EmptySource)));
            assert!(!resource.is_loaded());
        }
    }

    #[test]
    fn missing_files_fail_to_load() {
        let result = Resource::from_file(ResourceKind::Streaming, &device(Default::default()), "missing/theme.ogg");
        assert!(matches!(result, Err(LoadError::File(FromFileError::Io(_)))));
    }

    #[test]
    fn metadata() {
        let resource = loaded(ResourceKind::Streaming, 3);

        assert!(resource.is_stream());
        assert!(resource.is_loaded());
        assert_eq!(resource.format(), Some(FORMAT));
        assert_eq!(resource.size(), 3 * 44_100);
        assert_eq!(resource.size_bytes(), 3 * FORMAT.bytes_per_second());
        assert_eq!(resource.reference_count(), 0);
    }

    #[test]
    fn static_buffers_are_truncated_and_end_the_stream() {
        let settings = AudioSettings {
            max_static_bytes: 4_000,
            ..Default::default()
        };
        let resource = Resource::new(ResourceKind::Static, &device(settings)).unwrap();
        resource.load(Box::new(MemorySource::silence(FORMAT, 10_000))).unwrap();

        let (mock, voice) = voice();
        assert!(resource.bind(ListenerId::new(), &voice).unwrap());

        let chunk = mock.queued_chunks()[0].clone();
        assert_eq!(chunk.len(), 4_000);
        assert!(chunk.is_end_of_stream());
        assert_eq!(resource.size(), 1_000);
    }

    #[test]
    fn binding_needs_loaded_audio() {
        let (_, voice) = voice();

        for kind in [ResourceKind::Static, ResourceKind::Streaming] {
            let resource = Resource::new(kind, &device(Default::default())).unwrap();
            let result = resource.bind(ListenerId::new(), &voice);
            assert!(matches!(result, Err(BindError::NotLoaded)));
        }
    }

    #[test]
    fn double_bind_is_not_counted() {
        for kind in [ResourceKind::Static, ResourceKind::Streaming] {
            let resource = loaded(kind, 3);
            let (mock, voice) = voice();
            let listener = ListenerId::new();

            assert!(resource.bind(listener, &voice).unwrap());
            let submissions = mock.submissions();

            assert!(!resource.bind(listener, &voice).unwrap());
            assert_eq!(resource.reference_count(), 1);
            assert_eq!(mock.submissions(), submissions);
        }
    }

    #[test]
    fn unload_waits_for_every_binding() {
        for kind in [ResourceKind::Static, ResourceKind::Streaming] {
            let resource = loaded(kind, 3);
            let (_, first_voice) = voice();
            let (_, second_voice) = voice();
            let (first, second) = (ListenerId::new(), ListenerId::new());

            resource.bind(first, &first_voice).unwrap();
            resource.bind(second, &second_voice).unwrap();
            assert_eq!(resource.reference_count(), 2);

            assert!(resource.unbind(first, &first_voice));
            assert_eq!(resource.reference_count(), 1);
            assert!(!resource.unload());
            assert!(resource.is_loaded());

            assert!(resource.unbind(second, &second_voice));
            assert!(!resource.unbind(second, &second_voice));
            assert_eq!(resource.reference_count(), 0);
            assert!(resource.unload());
            assert!(!resource.is_loaded());
            assert!(matches!(resource.bind(first, &first_voice), Err(BindError::NotLoaded)));
        }
    }

    #[test]
    fn static_seek_starts_inside_the_buffer() {
        let resource = loaded(ResourceKind::Static, 3);
        let (mock, voice) = voice();
        let listener = ListenerId::new();
        resource.bind(listener, &voice).unwrap();

        assert!(resource.seek(listener, &voice, 1_001));
        assert_eq!(resource.playback_position(listener, &voice), 1_001);
        assert_eq!(mock.queued_count(), 1);

        assert!(resource.seek(listener, &voice, 4 * 44_100));
        assert_eq!(resource.playback_position(listener, &voice), 0);
    }

    #[test]
    fn stream_seek_moves_the_position() {
        let resource = loaded(ResourceKind::Streaming, 3);
        let (_, voice) = voice();
        let listener = ListenerId::new();
        resource.bind(listener, &voice).unwrap();

        assert!(resource.seek(listener, &voice, 50_000));
        assert_eq!(resource.playback_position(listener, &voice), 50_000);
        assert!(!resource.is_end_of_stream(listener));
    }

    #[test]
    fn static_resources_do_not_stream() {
        let resource = loaded(ResourceKind::Static, 1);
        let (mock, voice) = voice();
        let listener = ListenerId::new();
        resource.bind(listener, &voice).unwrap();

        let (_, generation) = mock.take_next().unwrap();
        assert!(!resource.stream_next(listener, &voice, generation));
        assert!(resource.is_end_of_stream(listener));
    }
}

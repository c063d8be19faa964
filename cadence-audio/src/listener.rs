use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::backend::Backend;
use crate::chunk::ListenerId;
use crate::device::AudioDevice;
use crate::error::{BindError, PlayError};
use crate::format::SampleFormat;
use crate::resource::Resource;
use crate::state::{PlaybackState, PlaybackStatus};
use crate::voice::{ChunkEvent, Voice, VoiceEvents};

struct VoiceSlot {
    format: SampleFormat,
    voice: Arc<dyn Voice>,
}

#[derive(Default)]
struct ListenerSlot {
    voice: Option<VoiceSlot>,
    resource: Option<Arc<Resource>>,
}

struct ListenerShared {
    id: ListenerId,
    state: PlaybackState,
    volume: AtomicU32,
    slot: Mutex<ListenerSlot>,
}

impl ListenerShared {
    fn current(&self) -> Option<(Arc<Resource>, Arc<dyn Voice>)> {
        let slot = self.slot.lock().unwrap();
        let resource = slot.resource.clone()?;
        let voice = slot.voice.as_ref()?.voice.clone();
        Some((resource, voice))
    }

    fn rewind(&self) -> bool {
        let Some((resource, voice)) = self.current() else {
            return false;
        };

        resource.reset_buffer(self.id, &voice);
        self.state.set_initial(true);
        self.state.set_paused(false);

        if self.state.is_playing() {
            voice.start();
        }

        true
    }

    /// Returns the resource and voice an event is about, or [`None`] for
    /// events of chunks that were flushed or belong to a previous resource.
    fn current_for(&self, event: &ChunkEvent) -> Option<(Arc<Resource>, Arc<dyn Voice>)> {
        self.current()
            .filter(|(resource, voice)| resource.id() == event.owner && voice.generation() == event.generation)
    }

    fn on_chunk_consumed(&self, event: &ChunkEvent) {
        let Some((resource, voice)) = self.current_for(event) else {
            return;
        };

        self.state.set_initial(false);

        if resource.is_stream() {
            resource.stream_next(self.id, &voice, event.generation);
        }
    }

    fn on_stream_end(&self, event: &ChunkEvent) {
        if self.current_for(event).is_none() {
            return;
        }

        match self.state.is_looping() {
            true => {
                self.rewind();
            }
            false => {
                debug!(listener = ?self.id, "playback finished");
                self.state.set_playing(false);
            }
        }
    }
}

/// Forwards the notifications of a voice to the listener that owns it.
struct ListenerEvents {
    shared: Weak<ListenerShared>,
}

impl VoiceEvents for ListenerEvents {
    fn on_chunk_consumed(&self, event: &ChunkEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_chunk_consumed(event);
        }
    }

    fn on_stream_end(&self, event: &ChunkEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_stream_end(event);
        }
    }
}

/// Plays one [`Resource`] at a time.
///
/// A listener owns a voice of the device and keeps it as long as the
/// resources it plays share the same format. Dropping the listener releases
/// its binding.
pub struct Listener<B: Backend> {
    device: AudioDevice<B>,
    shared: Arc<ListenerShared>,
}

impl<B: Backend> Listener<B> {
    /// Creates a listener without a resource. The device doesn't have to be
    /// initialized yet.
    #[must_use]
    pub fn new(device: &AudioDevice<B>) -> Self {
        Self {
            device: device.clone(),
            shared: Arc::new(ListenerShared {
                id: ListenerId::new(),
                state: PlaybackState::new(),
                volume: AtomicU32::new(1.0f32.to_bits()),
                slot: Mutex::default(),
            }),
        }
    }

    /// The id this listener's bindings are stored under.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.shared.id
    }

    /// Binds the listener to `resource`, releasing the previous one.
    ///
    /// Playback is stopped and starts at the beginning with the next
    /// [`play`](Self::play).
    pub fn set_resource(&self, resource: Arc<Resource>) -> Result<(), PlayError> {
        self.device.ensure_initialized()?;
        let format = resource.format().ok_or(BindError::NotLoaded)?;

        let mut guard = self.shared.slot.lock().unwrap();
        let slot = &mut *guard;

        if slot.resource.as_ref().is_some_and(|current| Arc::ptr_eq(current, &resource)) {
            return Ok(());
        }

        if let (Some(previous), Some(voice_slot)) = (slot.resource.take(), slot.voice.as_ref()) {
            previous.unbind(self.shared.id, &voice_slot.voice);
        }

        let voice = match &slot.voice {
            Some(voice_slot) if voice_slot.format == format => Arc::clone(&voice_slot.voice),
            _ => {
                let events = Arc::new(ListenerEvents {
                    shared: Arc::downgrade(&self.shared),
                });
                let voice = self.device.create_voice(format, events)?;
                voice.set_volume(self.volume());
                slot.voice = Some(VoiceSlot {
                    format,
                    voice: Arc::clone(&voice),
                });
                voice
            }
        };

        resource.bind(self.shared.id, &voice)?;
        slot.resource = Some(resource);
        self.shared.state.reset();

        Ok(())
    }

    /// Binds `resource` and applies the playback settings in one go.
    pub fn play_resource(&self, resource: Arc<Resource>, looping: bool, autoplay: bool, volume: f32) -> Result<(), PlayError> {
        self.set_resource(resource)?;
        self.set_looping(looping);
        self.set_volume(volume);

        if autoplay {
            self.play()?;
        }

        Ok(())
    }

    /// Releases the current resource.
    pub fn clear_resource(&self) {
        let mut guard = self.shared.slot.lock().unwrap();
        let slot = &mut *guard;

        if let (Some(resource), Some(voice_slot)) = (slot.resource.take(), slot.voice.as_ref()) {
            resource.unbind(self.shared.id, &voice_slot.voice);
        }

        self.shared.state.reset();
    }

    /// The resource the listener is bound to.
    #[must_use]
    pub fn resource(&self) -> Option<Arc<Resource>> {
        self.shared.slot.lock().unwrap().resource.clone()
    }

    /// Starts playback.
    ///
    /// A listener that is already playing starts over. A listener that
    /// played to the end starts at the beginning, a paused one resumes.
    pub fn play(&self) -> Result<(), PlayError> {
        self.device.ensure_initialized()?;
        let (resource, voice) = self.shared.current().ok_or(PlayError::NothingToPlay)?;

        if self.shared.state.is_playing() {
            self.shared.rewind();
            return Ok(());
        }

        if voice.queued_count() == 0 {
            self.shared.state.set_initial(true);
            resource.reset_buffer(self.shared.id, &voice);
        }

        voice.start();
        self.shared.state.set_playing(true);

        Ok(())
    }

    /// Stops playback and drops everything queued. Does nothing unless the
    /// listener is playing.
    pub fn stop(&self) {
        if !self.shared.state.is_playing() {
            return;
        }

        if let Some((resource, voice)) = self.shared.current() {
            resource.halt(self.shared.id, &voice);
        }

        self.shared.state.set_playing(false);
    }

    /// Stops playback but keeps the queue, so [`play`](Self::play) resumes
    /// where it left off.
    pub fn pause(&self) {
        if let Some((_, voice)) = self.shared.current() {
            voice.stop();
        }

        self.shared.state.set_paused(true);
    }

    /// Moves back to the beginning. A playing listener keeps playing.
    pub fn rewind(&self) -> bool {
        self.shared.rewind()
    }

    /// Moves playback to `frame`. Positions past the end move to the
    /// beginning. A playing listener keeps playing.
    pub fn seek(&self, frame: usize) -> bool {
        let Some((resource, voice)) = self.shared.current() else {
            return false;
        };

        let seeked = resource.seek(self.shared.id, &voice, frame);
        self.shared.state.set_initial(true);

        if self.shared.state.is_playing() {
            voice.start();
        }

        seeked
    }

    /// Whether the voice is playing.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.shared.state.is_playing()
    }

    /// Whether playback was paused and can be resumed.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.state.is_paused()
    }

    /// Neither playing nor paused.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        !self.is_playing() && !self.is_paused()
    }

    /// Whether nothing was played since the listener was bound, rewound or
    /// seeked.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.shared.state.is_initial()
    }

    /// Whether playback starts over at the end.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.shared.state.is_looping()
    }

    /// Makes playback start over at the end.
    pub fn set_looping(&self, looping: bool) {
        self.shared.state.set_looping(looping);
    }

    /// Summarizes the playback flags.
    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        self.shared.state.status()
    }

    /// The volume between `0.0` and `1.0`.
    #[must_use]
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.shared.volume.load(Ordering::SeqCst))
    }

    /// Sets the volume, clamped to `0.0..=1.0`.
    pub fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.shared.volume.store(volume.to_bits(), Ordering::SeqCst);

        if let Some(voice_slot) = &self.shared.slot.lock().unwrap().voice {
            voice_slot.voice.set_volume(volume);
        }
    }

    /// Playback position in frames.
    #[must_use]
    pub fn playback_position(&self) -> usize {
        self.shared
            .current()
            .map_or(0, |(resource, voice)| resource.playback_position(self.shared.id, &voice))
    }

    /// Length of the current resource in frames.
    #[must_use]
    pub fn playback_size(&self) -> usize {
        self.resource().map_or(0, |resource| resource.size())
    }

    /// Sample rate of the current resource, `0` without one.
    #[must_use]
    pub fn samples_per_second(&self) -> u32 {
        self.resource()
            .and_then(|resource| resource.format())
            .map_or(0, |format| format.sample_rate)
    }

    /// Whether the current resource is decoded while playing.
    #[must_use]
    pub fn is_streamable(&self) -> bool {
        self.resource().is_some_and(|resource| resource.is_stream())
    }

    /// Whether there is nothing left to queue. The last chunk might still be
    /// playing.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        self.resource()
            .is_none_or(|resource| resource.is_end_of_stream(self.shared.id))
    }
}

impl<B: Backend> Drop for Listener<B> {
    fn drop(&mut self) {
        self.clear_resource();
    }
}

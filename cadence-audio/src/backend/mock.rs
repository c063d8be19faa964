//! A backend that doesn't output any audio.
//!
//! [`MockVoice`]s only record what is done to them. Playback progress is
//! driven by hand with [`MockVoice::complete_next`], which delivers the
//! completion notifications on the calling thread.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use crate::backend::Backend;
use crate::chunk::Chunk;
use crate::format::SampleFormat;
use crate::settings::AudioSettings;
use crate::voice::{ChunkEvent, Voice, VoiceEvents};

/// A [`Backend`] for tests.
pub struct MockBackend {
    sample_rate: u32,
    voices: Mutex<Vec<Arc<MockVoice>>>,
}

impl MockBackend {
    /// Every voice created so far, oldest first.
    #[must_use]
    pub fn voices(&self) -> Vec<Arc<MockVoice>> {
        self.voices.lock().unwrap().clone()
    }

    /// The voice created most recently.
    #[must_use]
    pub fn last_voice(&self) -> Option<Arc<MockVoice>> {
        self.voices.lock().unwrap().last().cloned()
    }
}

impl Backend for MockBackend {
    type Error = Infallible;
    type Settings = ();

    fn setup(_settings: Self::Settings, audio_settings: &AudioSettings) -> Result<Self, Self::Error> {
        Ok(Self {
            sample_rate: audio_settings.sample_rate,
            voices: Mutex::default(),
        })
    }

    fn create_voice(&self, format: SampleFormat, events: Arc<dyn VoiceEvents>) -> Result<Arc<dyn Voice>, Self::Error> {
        let voice = Arc::new(MockVoice::new(format, events));
        self.voices.lock().unwrap().push(Arc::clone(&voice));
        Ok(voice)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

struct DiscardEvents;

impl VoiceEvents for DiscardEvents {
    fn on_chunk_consumed(&self, _event: &ChunkEvent) {}

    fn on_stream_end(&self, _event: &ChunkEvent) {}
}

struct MockVoiceState {
    queue: VecDeque<(Arc<Chunk>, usize)>,
    playing: bool,
    volume: f32,
    generation: u64,
    submissions: usize,
    max_queued: usize,
}

/// A voice that records submissions instead of playing them.
pub struct MockVoice {
    format: SampleFormat,
    events: Arc<dyn VoiceEvents>,
    state: Mutex<MockVoiceState>,
}

impl MockVoice {
    fn new(format: SampleFormat, events: Arc<dyn VoiceEvents>) -> Self {
        Self {
            format,
            events,
            state: Mutex::new(MockVoiceState {
                queue: VecDeque::new(),
                playing: false,
                volume: 1.0,
                generation: 0,
                submissions: 0,
                max_queued: 0,
            }),
        }
    }

    /// Creates a voice that isn't tied to a backend and discards its
    /// notifications.
    #[must_use]
    pub fn detached(format: SampleFormat) -> Arc<Self> {
        Arc::new(Self::new(format, Arc::new(DiscardEvents)))
    }

    /// The format the voice was created for.
    #[must_use]
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Whether the voice was started and not stopped since.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    /// The queued chunks, head first.
    #[must_use]
    pub fn queued_chunks(&self) -> Vec<Arc<Chunk>> {
        self.state.lock().unwrap().queue.iter().map(|(chunk, _)| Arc::clone(chunk)).collect()
    }

    /// Total number of submitted chunks.
    #[must_use]
    pub fn submissions(&self) -> usize {
        self.state.lock().unwrap().submissions
    }

    /// The highest number of chunks that were queued at the same time.
    #[must_use]
    pub fn max_queued(&self) -> usize {
        self.state.lock().unwrap().max_queued
    }

    /// Moves the cursor of the head chunk forward without finishing it.
    pub fn advance(&self, frames: usize) {
        let mut state = self.state.lock().unwrap();
        if let Some((chunk, position)) = state.queue.front_mut() {
            *position = (*position + frames).min(chunk.num_frames().saturating_sub(1));
        }
    }

    /// Pops the head chunk as if it finished playing, but holds back the
    /// notification. Returns the chunk and the generation it finished in.
    pub fn take_next(&self) -> Option<(Arc<Chunk>, u64)> {
        let mut state = self.state.lock().unwrap();
        let generation = state.generation;
        state.queue.pop_front().map(|(chunk, _)| (chunk, generation))
    }

    /// Delivers the notifications for a chunk taken with
    /// [`take_next`](Self::take_next). The chunk is released first.
    pub fn deliver(&self, chunk: Arc<Chunk>, generation: u64) {
        let event = ChunkEvent {
            owner: chunk.owner(),
            generation,
        };
        let end_of_stream = chunk.is_end_of_stream();
        drop(chunk);

        self.events.on_chunk_consumed(&event);

        if end_of_stream {
            self.events.on_stream_end(&event);
        }
    }

    /// Finishes the head chunk and delivers its notifications. Returns
    /// `false` if nothing was queued.
    pub fn complete_next(&self) -> bool {
        match self.take_next() {
            Some((chunk, generation)) => {
                self.deliver(chunk, generation);
                true
            }
            None => false,
        }
    }
}

impl Voice for MockVoice {
    fn submit(&self, chunk: Arc<Chunk>, play_begin: usize) {
        let mut state = self.state.lock().unwrap();
        state.queue.push_back((chunk, play_begin));
        state.submissions += 1;
        state.max_queued = state.max_queued.max(state.queue.len());
    }

    fn start(&self) {
        self.state.lock().unwrap().playing = true;
    }

    fn stop(&self) {
        self.state.lock().unwrap().playing = false;
    }

    fn flush(&self) {
        let mut state = self.state.lock().unwrap();
        state.queue.clear();
        state.generation += 1;
    }

    fn queued_count(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    fn cursor(&self) -> usize {
        self.state.lock().unwrap().queue.front().map_or(0, |(_, position)| *position)
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().unwrap().volume = volume;
    }

    fn volume(&self) -> f32 {
        self.state.lock().unwrap().volume
    }

    fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }
}

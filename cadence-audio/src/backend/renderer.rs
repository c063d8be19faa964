use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{trace, warn};

use super::storage::{SlotController, SlotStorage};
use crate::chunk::Chunk;
use crate::error::VoiceLimitReached;
use crate::format::SampleFormat;
use crate::frame::{Frame, interpolate_frame};
use crate::settings::AudioSettings;
use crate::voice::{ChunkEvent, Voice, VoiceEvents};

const DISPATCHER_THREAD_SLEEP_DURATION: Duration = Duration::from_millis(1);

struct QueuedChunk {
    chunk: Arc<Chunk>,
    /// Index of the next frame to play.
    position: usize,
}

#[derive(Default)]
struct VoiceQueue {
    chunks: VecDeque<QueuedChunk>,
    fractional_position: f64,
}

/// A voice of the software mixer.
///
/// The control side submits and flushes chunks through the [`Voice`] trait
/// while the [`Renderer`] plays them on the audio thread.
pub(crate) struct MixerVoice {
    format: SampleFormat,
    events: Arc<dyn VoiceEvents>,
    queue: Mutex<VoiceQueue>,
    playing: AtomicBool,
    volume: AtomicU32,
    generation: AtomicU64,
}

impl MixerVoice {
    fn new(format: SampleFormat, events: Arc<dyn VoiceEvents>) -> Self {
        Self {
            format,
            events,
            queue: Mutex::default(),
            playing: AtomicBool::new(false),
            volume: AtomicU32::new(1.0f32.to_bits()),
            generation: AtomicU64::new(0),
        }
    }

    /// Mixes the voice into `out`. Finished chunks are handed to
    /// `event_producer`.
    ///
    /// If the control side holds the queue, the voice is skipped for this
    /// block.
    fn render(self: &Arc<Self>, out: &mut [Frame], sample_rate: u32, event_producer: &mut Producer<VoiceEvent>) {
        if !self.playing.load(Ordering::SeqCst) {
            return;
        }

        let Ok(mut queue) = self.queue.try_lock() else {
            return;
        };

        let volume = self.volume();
        let generation = self.generation.load(Ordering::SeqCst);
        let step = self.format.sample_rate as f64 / sample_rate as f64;
        let VoiceQueue {
            chunks,
            fractional_position,
        } = &mut *queue;

        for out_frame in out.iter_mut() {
            let Some(head) = chunks.front_mut() else {
                break;
            };

            let index = head.position;
            let previous = match index {
                0 => Frame::ZERO,
                index => head.chunk.frame_at(index - 1),
            };
            let frame = interpolate_frame(
                previous,
                head.chunk.frame_at(index),
                head.chunk.frame_at(index + 1),
                head.chunk.frame_at(index + 2),
                *fractional_position as f32,
            );
            *out_frame += frame * volume;

            *fractional_position += step;
            let whole_frames = fractional_position.floor();
            *fractional_position -= whole_frames;
            head.position += whole_frames as usize;

            if head.position < head.chunk.num_frames() {
                continue;
            }

            if let Some(finished) = chunks.pop_front() {
                let event = VoiceEvent {
                    voice: Arc::clone(self),
                    chunk: finished.chunk,
                    generation,
                };

                if event_producer.push(event).is_err() {
                    warn!("voice event queue is full, a completion notification is lost");
                }
            }
        }
    }
}

impl Voice for MixerVoice {
    fn submit(&self, chunk: Arc<Chunk>, play_begin: usize) {
        let mut queue = self.queue.lock().unwrap();
        if queue.chunks.is_empty() {
            queue.fractional_position = 0.0;
        }
        queue.chunks.push_back(QueuedChunk {
            chunk,
            position: play_begin,
        });
    }

    fn start(&self) {
        self.playing.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn flush(&self) {
        let mut queue = self.queue.lock().unwrap();
        queue.chunks.clear();
        queue.fractional_position = 0.0;
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn queued_count(&self) -> usize {
        self.queue.lock().unwrap().chunks.len()
    }

    fn cursor(&self) -> usize {
        self.queue
            .lock()
            .unwrap()
            .chunks
            .front()
            .map_or(0, |queued_chunk| queued_chunk.position)
    }

    fn set_volume(&self, volume: f32) {
        self.volume.store(volume.to_bits(), Ordering::SeqCst);
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::SeqCst))
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// A chunk that finished playing on the audio thread.
pub(crate) struct VoiceEvent {
    voice: Arc<MixerVoice>,
    chunk: Arc<Chunk>,
    generation: u64,
}

/// Mixes every registered voice into the device buffer.
pub(crate) struct Renderer {
    sample_rate: u32,
    buffer_size: usize,
    voices: SlotStorage<Arc<MixerVoice>>,
    event_producer: Producer<VoiceEvent>,
    mix_buffer: Vec<Frame>,
}

impl Renderer {
    #[must_use]
    pub(crate) fn new(settings: &AudioSettings, sample_rate: u32) -> (Self, VoiceController, EventDispatcher) {
        let buffer_size = (settings.buffer_size as usize).max(1);
        let (voices, voice_controller) = SlotStorage::new(settings.voice_capacity);
        let (event_producer, event_consumer) = RingBuffer::new(settings.event_capacity);

        (
            Self {
                sample_rate,
                buffer_size,
                voices,
                event_producer,
                mix_buffer: vec![Frame::ZERO; buffer_size],
            },
            VoiceController { voice_controller },
            EventDispatcher { event_consumer },
        )
    }

    pub(crate) fn on_change_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Drops the voices only the renderer still knows about and picks up
    /// newly created ones.
    pub(crate) fn on_start_processing(&mut self) {
        self.voices.remove_and_add(|voice| Arc::strong_count(voice) == 1);
    }

    /// Fills an interleaved output buffer.
    pub(crate) fn process(&mut self, out: &mut [f32], channels: u16) {
        let channels = channels.max(1) as usize;

        for block in out.chunks_mut(self.buffer_size * channels) {
            let mix_buffer = &mut self.mix_buffer[..block.len() / channels];
            mix_buffer.fill(Frame::ZERO);

            for voice in self.voices.iter() {
                voice.render(mix_buffer, self.sample_rate, &mut self.event_producer);
            }

            for (out_frame, frame) in block.chunks_mut(channels).zip(mix_buffer.iter()) {
                match out_frame {
                    [mono] => *mono = frame.as_mono(),
                    [left, right, rest @ ..] => {
                        *left = frame.left;
                        *right = frame.right;
                        rest.fill(0.0);
                    }
                    [] => {}
                }
            }
        }
    }
}

/// Registers new voices with a [`Renderer`].
pub(crate) struct VoiceController {
    voice_controller: SlotController<Arc<MixerVoice>>,
}

impl VoiceController {
    pub(crate) fn create_voice(&self, format: SampleFormat, events: Arc<dyn VoiceEvents>) -> Result<Arc<MixerVoice>, VoiceLimitReached> {
        let voice = Arc::new(MixerVoice::new(format, events));
        self.voice_controller.insert(Arc::clone(&voice))?;
        Ok(voice)
    }
}

pub(crate) enum NextStep {
    Continue,
    Wait,
    End,
}

/// Delivers completion notifications off the audio thread.
///
/// The chunk of an event is released before the voice's events are called,
/// so a listener can recycle its allocation right away.
pub(crate) struct EventDispatcher {
    event_consumer: Consumer<VoiceEvent>,
}

impl EventDispatcher {
    /// Delivers every pending event. Returns the number of events that were
    /// taken from the queue.
    pub(crate) fn dispatch_pending(&mut self) -> usize {
        let mut count = 0;

        while let Ok(VoiceEvent { voice, chunk, generation }) = self.event_consumer.pop() {
            count += 1;

            let event = ChunkEvent {
                owner: chunk.owner(),
                generation,
            };
            let end_of_stream = chunk.is_end_of_stream();
            drop(chunk);

            if voice.generation() != generation {
                trace!(generation, "discarding event of a flushed voice");
                continue;
            }

            voice.events.on_chunk_consumed(&event);

            if end_of_stream {
                voice.events.on_stream_end(&event);
            }
        }

        count
    }

    fn run(&mut self, should_drop: &AtomicBool) -> NextStep {
        if should_drop.load(Ordering::SeqCst) {
            return NextStep::End;
        }

        match self.dispatch_pending() {
            0 => NextStep::Wait,
            _ => NextStep::Continue,
        }
    }

    pub(crate) fn start(mut self) -> EventDispatcherController {
        let should_drop = Arc::new(AtomicBool::new(false));
        let controller = EventDispatcherController {
            should_drop: Arc::clone(&should_drop),
        };

        std::thread::spawn(move || {
            loop {
                match self.run(&should_drop) {
                    NextStep::Continue => {}
                    NextStep::Wait => std::thread::sleep(DISPATCHER_THREAD_SLEEP_DURATION),
                    NextStep::End => break,
                }
            }
        });

        controller
    }
}

pub(crate) struct EventDispatcherController {
    should_drop: Arc<AtomicBool>,
}

impl EventDispatcherController {
    pub(crate) fn stop(&self) {
        self.should_drop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use approx::assert_relative_eq;

    use super::{EventDispatcher, Renderer, VoiceController};
    use crate::chunk::{Chunk, ResourceId};
    use crate::format::SampleFormat;
    use crate::settings::AudioSettings;
    use crate::voice::{ChunkEvent, Voice, VoiceEvents};

    const FORMAT: SampleFormat = SampleFormat::new(8_000, 2, 16);

    #[derive(Default)]
    struct RecordedEvents {
        events: Mutex<Vec<(&'static str, ChunkEvent)>>,
    }

    impl RecordedEvents {
        fn take(&self) -> Vec<(&'static str, ChunkEvent)> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl VoiceEvents for RecordedEvents {
        fn on_chunk_consumed(&self, event: &ChunkEvent) {
            self.events.lock().unwrap().push(("consumed", *event));
        }

        fn on_stream_end(&self, event: &ChunkEvent) {
            self.events.lock().unwrap().push(("stream end", *event));
        }
    }

    fn setup() -> (Renderer, VoiceController, EventDispatcher) {
        let settings = AudioSettings {
            buffer_size: 4,
            voice_capacity: 4,
            event_capacity: 16,
            ..Default::default()
        };
        Renderer::new(&settings, FORMAT.sample_rate)
    }

    /// A chunk where every frame is `(value, -value)`.
    fn constant_chunk(owner: ResourceId, frames: usize, value: i16, end_of_stream: bool) -> Arc<Chunk> {
        let data = (0..frames)
            .flat_map(|_| [value.to_le_bytes(), (-value).to_le_bytes()])
            .flatten()
            .collect();
        Arc::new(Chunk::from_pcm(owner, FORMAT, data, end_of_stream))
    }

    #[test]
    fn plays_submitted_chunks_and_reports_them() {
        let (mut renderer, controller, mut dispatcher) = setup();
        let events = Arc::new(RecordedEvents::default());
        let voice = controller.create_voice(FORMAT, events.clone()).unwrap();
        let owner = ResourceId::next();

        voice.submit(constant_chunk(owner, 3, i16::MAX / 2, false), 0);
        voice.submit(constant_chunk(owner, 3, i16::MAX / 4, true), 0);
        voice.start();

        let mut out = [0.0; 16];
        renderer.on_start_processing();
        renderer.process(&mut out, 2);

        assert_relative_eq!(out[0], 0.5, epsilon = 0.001);
        assert_relative_eq!(out[1], -0.5, epsilon = 0.001);
        assert_relative_eq!(out[6], 0.25, epsilon = 0.001);
        assert_relative_eq!(out[12], 0.0);
        assert_eq!(voice.queued_count(), 0);

        assert_eq!(dispatcher.dispatch_pending(), 2);
        let event = ChunkEvent { owner, generation: 0 };
        assert_eq!(events.take(), vec![("consumed", event), ("consumed", event), ("stream end", event)]);
    }

    #[test]
    fn stopped_voices_are_silent() {
        let (mut renderer, controller, mut dispatcher) = setup();
        let voice = controller.create_voice(FORMAT, Arc::new(RecordedEvents::default())).unwrap();

        voice.submit(constant_chunk(ResourceId::next(), 3, i16::MAX, false), 0);

        let mut out = [0.0; 8];
        renderer.on_start_processing();
        renderer.process(&mut out, 2);

        assert!(out.iter().all(|sample| *sample == 0.0));
        assert_eq!(voice.queued_count(), 1);
        assert_eq!(dispatcher.dispatch_pending(), 0);
    }

    #[test]
    fn volume_scales_the_output() {
        let (mut renderer, controller, _dispatcher) = setup();
        let voice = controller.create_voice(FORMAT, Arc::new(RecordedEvents::default())).unwrap();

        voice.submit(constant_chunk(ResourceId::next(), 4, i16::MAX / 2, false), 0);
        voice.set_volume(0.5);
        voice.start();

        let mut out = [0.0; 2];
        renderer.on_start_processing();
        renderer.process(&mut out, 2);

        assert_relative_eq!(out[0], 0.25, epsilon = 0.001);
        assert_eq!(voice.cursor(), 1);
    }

    #[test]
    fn play_begin_skips_frames() {
        let (mut renderer, controller, _dispatcher) = setup();
        let voice = controller.create_voice(FORMAT, Arc::new(RecordedEvents::default())).unwrap();

        voice.submit(constant_chunk(ResourceId::next(), 10, 1_000, false), 7);
        voice.start();
        assert_eq!(voice.cursor(), 7);

        let mut out = [0.0; 4];
        renderer.on_start_processing();
        renderer.process(&mut out, 2);

        assert_eq!(voice.cursor(), 9);
    }

    #[test]
    fn events_of_flushed_chunks_are_discarded() {
        let (mut renderer, controller, mut dispatcher) = setup();
        let events = Arc::new(RecordedEvents::default());
        let voice = controller.create_voice(FORMAT, events.clone()).unwrap();

        voice.submit(constant_chunk(ResourceId::next(), 1, 100, false), 0);
        voice.start();

        let mut out = [0.0; 2];
        renderer.on_start_processing();
        renderer.process(&mut out, 2);

        voice.flush();
        assert_eq!(voice.generation(), 1);
        assert_eq!(dispatcher.dispatch_pending(), 1);
        assert!(events.take().is_empty());
    }

    #[test]
    fn resamples_to_the_device_rate() {
        let settings = AudioSettings {
            buffer_size: 16,
            ..Default::default()
        };
        let (mut renderer, controller, _dispatcher) = Renderer::new(&settings, FORMAT.sample_rate * 2);
        let voice = controller.create_voice(FORMAT, Arc::new(RecordedEvents::default())).unwrap();

        voice.submit(constant_chunk(ResourceId::next(), 8, 1_000, false), 0);
        voice.start();

        let mut out = [0.0; 8];
        renderer.on_start_processing();
        renderer.process(&mut out, 2);

        assert_eq!(voice.cursor(), 2);
    }

    #[test]
    fn dropped_voices_are_removed() {
        let (mut renderer, controller, _dispatcher) = setup();
        let voice = controller.create_voice(FORMAT, Arc::new(RecordedEvents::default())).unwrap();

        renderer.on_start_processing();
        assert_eq!(renderer.voices.len(), 1);

        drop(voice);
        renderer.on_start_processing();
        assert_eq!(renderer.voices.len(), 0);
    }

    #[test]
    fn mono_output_downmixes() {
        let (mut renderer, controller, _dispatcher) = setup();
        let voice = controller.create_voice(FORMAT, Arc::new(RecordedEvents::default())).unwrap();

        voice.submit(constant_chunk(ResourceId::next(), 4, i16::MAX / 2, false), 0);
        voice.start();

        let mut out = [1.0; 2];
        renderer.on_start_processing();
        renderer.process(&mut out, 1);

        assert_relative_eq!(out[0], 0.0, epsilon = 0.001);
    }
}

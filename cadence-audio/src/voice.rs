//! The contract between the playback engine and an audio output.

use std::sync::Arc;

use crate::chunk::{Chunk, ResourceId};

/// One audio output of a backend.
///
/// A voice plays the chunks submitted to it in order. Every method is
/// non-blocking from the caller's point of view: submissions go into the
/// voice's own queue and are picked up by the backend.
pub trait Voice: Send + Sync {
    /// Queues a chunk. Playback of the chunk starts at frame `play_begin`.
    fn submit(&self, chunk: Arc<Chunk>, play_begin: usize);

    /// Starts or resumes playback of the queue.
    fn start(&self);

    /// Stops playback without touching the queue.
    fn stop(&self);

    /// Releases every queued chunk without notifying the voice's events and
    /// advances the [`generation`](Self::generation).
    fn flush(&self);

    /// Number of chunks that are queued, including the one playing.
    fn queued_count(&self) -> usize;

    /// Index of the next frame to be played within the chunk at the head of
    /// the queue, or `0` if the queue is empty.
    fn cursor(&self) -> usize;

    /// Sets the linear volume between `0.0` and `1.0`.
    fn set_volume(&self, volume: f32);

    /// The linear volume between `0.0` and `1.0`.
    fn volume(&self) -> f32;

    /// Counter advanced by every [`flush`](Self::flush). Events carry the
    /// generation they were produced in.
    fn generation(&self) -> u64;
}

/// Notifications a voice sends back to the engine.
///
/// These are called from the backend's callback thread, never while the
/// voice holds a lock on its queue.
pub trait VoiceEvents: Send + Sync {
    /// A chunk finished playing and was released by the voice.
    fn on_chunk_consumed(&self, event: &ChunkEvent);

    /// A chunk flagged as the end of its stream finished playing. Always
    /// follows the matching [`on_chunk_consumed`](Self::on_chunk_consumed).
    fn on_stream_end(&self, event: &ChunkEvent);
}

/// Describes the chunk a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkEvent {
    /// The resource that produced the chunk.
    pub owner: ResourceId,
    /// The [`Voice::generation`] the chunk was consumed in.
    pub generation: u64,
}

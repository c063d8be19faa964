use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, TryLockError};

use hashbrown::HashMap;
use tracing::{debug, trace, warn};

use crate::chunk::{BoundChunk, Chunk, ListenerId, ResourceId};
use crate::decode::DecodeSource;
use crate::error::{BindError, LoadError};
use crate::format::SampleFormat;
use crate::voice::Voice;

/// An open decode source and the chunk at its very beginning.
struct LoadedStream {
    source: Mutex<Box<dyn DecodeSource>>,
    /// The chunk at offset zero. Shared by every binding.
    head: Arc<Chunk>,
    format: SampleFormat,
    /// Size of the stream in bytes. Sources may only learn their real length
    /// while decoding, so this follows the source after every read.
    size: AtomicUsize,
    chunk_bytes: usize,
}

impl LoadedStream {
    fn decode(&self, offset: usize) -> Option<Chunk> {
        let mut source = self.source.lock().unwrap();
        let chunk = Chunk::decode(self.head.owner(), source.as_mut(), offset, self.chunk_bytes);
        self.update_size(source.as_ref());
        chunk
    }

    fn refill(&self, chunk: &mut Chunk, offset: usize) -> bool {
        let mut source = self.source.lock().unwrap();
        let refilled = chunk.refill(source.as_mut(), offset, self.chunk_bytes);
        self.update_size(source.as_ref());
        refilled
    }

    fn update_size(&self, source: &dyn DecodeSource) {
        let size = source.size();
        if self.size.swap(size, Ordering::SeqCst) != size {
            debug!(size, "stream length changed while decoding");
        }
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Queues the chunk at `offset` and, if the stream goes on after it, the
    /// one following it.
    fn fill(&self, binding: &StreamBinding, chunks: &mut BoundChunks, voice: &Arc<dyn Voice>, offset: usize) -> bool {
        binding.base.store(offset, Ordering::SeqCst);
        binding.next.store(offset, Ordering::SeqCst);

        let front = match offset {
            0 => BoundChunk::ResourceOwned(Arc::clone(&self.head)),
            offset => match self.decode(offset) {
                Some(chunk) => BoundChunk::Transient(Arc::new(chunk)),
                None => {
                    warn!(offset, "failed to decode stream chunk");
                    return false;
                }
            },
        };

        let mut next = offset + front.chunk().len();
        voice.submit(Arc::clone(front.chunk()), 0);

        if !front.chunk().is_end_of_stream() && next < self.size() {
            match self.decode(next) {
                Some(back) => {
                    next += back.len();
                    let back = Arc::new(back);
                    voice.submit(Arc::clone(&back), 0);
                    chunks.back = Some(BoundChunk::Transient(back));
                }
                None => warn!(offset = next, "failed to decode stream chunk"),
            }
        }

        chunks.front = Some(front);
        binding.next.store(next, Ordering::SeqCst);
        trace!(offset, next, "filled stream binding");

        true
    }
}

#[derive(Default)]
struct BoundChunks {
    /// The chunk that is playing.
    front: Option<BoundChunk>,
    /// The chunk queued after it.
    back: Option<BoundChunk>,
}

impl BoundChunks {
    fn clear(&mut self, voice: &Arc<dyn Voice>) {
        voice.stop();
        voice.flush();
        self.front = None;
        self.back = None;
    }
}

/// The state of one listener playing the stream.
#[derive(Default)]
struct StreamBinding {
    /// Holding this lock marks the binding as busy.
    chunks: Mutex<BoundChunks>,
    /// Stream offset of the front chunk.
    base: AtomicUsize,
    /// Stream offset the next refill reads from.
    next: AtomicUsize,
}

/// Stream mode: chunks are decoded on demand while playing.
#[derive(Default)]
pub(super) struct Stream {
    loaded: RwLock<Option<Arc<LoadedStream>>>,
    /// The lock also serializes bind, unbind, load and unload.
    bindings: Mutex<HashMap<ListenerId, Arc<StreamBinding>>>,
}

impl Stream {
    pub(super) fn load(&self, owner: ResourceId, mut source: Box<dyn DecodeSource>, chunk_bytes: usize) -> Result<(), LoadError> {
        let _bindings = self.bindings.lock().unwrap();
        let mut loaded = self.loaded.write().unwrap();

        if loaded.is_some() {
            return Err(LoadError::AlreadyLoaded);
        }

        let head = Chunk::decode(owner, source.as_mut(), 0, chunk_bytes).ok_or(LoadError::EmptySource)?;

        *loaded = Some(Arc::new(LoadedStream {
            format: source.format(),
            size: AtomicUsize::new(source.size()),
            head: Arc::new(head),
            source: Mutex::new(source),
            chunk_bytes,
        }));

        Ok(())
    }

    pub(super) fn unload(&self) -> bool {
        let bindings = self.bindings.lock().unwrap();

        if !bindings.is_empty() {
            return false;
        }

        self.loaded.write().unwrap().take();
        true
    }

    /// Creates a binding and queues the beginning of the stream on `voice`.
    /// Returns `false` if the listener is already bound.
    pub(super) fn bind(&self, listener: ListenerId, voice: &Arc<dyn Voice>) -> Result<bool, BindError> {
        let mut bindings = self.bindings.lock().unwrap();
        let loaded = self.loaded().ok_or(BindError::NotLoaded)?;

        if bindings.contains_key(&listener) {
            return Ok(false);
        }

        let binding = Arc::new(StreamBinding::default());
        loaded.fill(&binding, &mut binding.chunks.lock().unwrap(), voice, 0);
        bindings.insert(listener, binding);

        Ok(true)
    }

    pub(super) fn unbind(&self, listener: ListenerId, voice: &Arc<dyn Voice>) -> bool {
        let Some(binding) = self.bindings.lock().unwrap().remove(&listener) else {
            return false;
        };

        binding.chunks.lock().unwrap().clear(voice);
        true
    }

    /// Restarts the binding at `frame`. Playback is stopped.
    pub(super) fn seek(&self, listener: ListenerId, voice: &Arc<dyn Voice>, frame: usize) -> bool {
        let (Some(loaded), Some(binding)) = (self.loaded(), self.binding(listener)) else {
            return false;
        };

        let offset = match frame.checked_mul(loaded.format.block_align()) {
            Some(offset) if offset < loaded.size() => offset,
            _ => 0,
        };

        let mut chunks = binding.chunks.lock().unwrap();
        chunks.clear(voice);
        loaded.fill(&binding, &mut chunks, voice, offset)
    }

    /// Stops `voice` and drops every queued chunk of the binding.
    pub(super) fn halt(&self, listener: ListenerId, voice: &Arc<dyn Voice>) {
        if let Some(binding) = self.binding(listener) {
            binding.chunks.lock().unwrap().clear(voice);
        }
    }

    /// Advances the binding after its front chunk finished playing.
    ///
    /// The chunk that was queued behind it becomes the front and a new chunk
    /// is decoded behind that. Returns `false` if nothing was queued: at the
    /// end of the stream, for notifications from before the last flush and
    /// when the binding is busy.
    pub(super) fn stream_next(&self, listener: ListenerId, voice: &Arc<dyn Voice>, generation: u64) -> bool {
        let (Some(loaded), Some(binding)) = (self.loaded(), self.binding(listener)) else {
            return false;
        };

        let mut chunks = match binding.chunks.try_lock() {
            Ok(chunks) => chunks,
            Err(TryLockError::WouldBlock) => {
                warn!(?listener, "stream binding is busy, dropping refill");
                return false;
            }
            Err(TryLockError::Poisoned(error)) => panic!("stream binding poisoned: {error}"),
        };

        if voice.generation() != generation {
            trace!(?listener, generation, "ignoring notification of a flushed chunk");
            return false;
        }

        let Some(consumed) = chunks.front.take() else {
            return false;
        };

        chunks.front = chunks.back.take();

        let next = binding.next.load(Ordering::SeqCst);
        let base = chunks.front.as_ref().map_or(next, |front| front.chunk().offset());
        binding.base.store(base, Ordering::SeqCst);

        if next >= loaded.size() {
            trace!(?listener, "reached the end of the stream");
            return false;
        }

        // The chunk at offset zero belongs to the resource, so it can't be
        // recycled.
        let refilled = match consumed.into_scratch() {
            Some(mut scratch) => loaded.refill(&mut scratch, next).then_some(scratch),
            None => loaded.decode(next),
        };

        let Some(back) = refilled else {
            warn!(?listener, offset = next, "failed to refill stream chunk");
            return false;
        };

        binding.next.store(next + back.len(), Ordering::SeqCst);
        trace!(?listener, offset = next, length = back.len(), "refilled stream chunk");

        let back = Arc::new(back);
        voice.submit(Arc::clone(&back), 0);
        chunks.back = Some(BoundChunk::Transient(back));

        true
    }

    /// Whether the binding has nothing left to decode. Unbound listeners are
    /// always at the end.
    #[must_use]
    pub(super) fn is_end_of_stream(&self, listener: ListenerId) -> bool {
        match (self.loaded(), self.binding(listener)) {
            (Some(loaded), Some(binding)) => binding.next.load(Ordering::SeqCst) >= loaded.size(),
            _ => true,
        }
    }

    /// Playback position of the binding in frames.
    #[must_use]
    pub(super) fn playback_position(&self, listener: ListenerId, voice: &Arc<dyn Voice>) -> usize {
        match (self.loaded(), self.binding(listener)) {
            (Some(loaded), Some(binding)) => loaded.format.bytes_to_frames(binding.base.load(Ordering::SeqCst)) + voice.cursor(),
            _ => 0,
        }
    }

    #[must_use]
    pub(super) fn format(&self) -> Option<SampleFormat> {
        self.loaded().map(|loaded| loaded.format)
    }

    /// Size of the stream in bytes.
    #[must_use]
    pub(super) fn size(&self) -> usize {
        self.loaded().map_or(0, |loaded| loaded.size())
    }

    #[must_use]
    pub(super) fn is_loaded(&self) -> bool {
        self.loaded.read().unwrap().is_some()
    }

    #[must_use]
    pub(super) fn reference_count(&self) -> usize {
        self.bindings.lock().unwrap().len()
    }

    fn loaded(&self) -> Option<Arc<LoadedStream>> {
        self.loaded.read().unwrap().clone()
    }

    fn binding(&self, listener: ListenerId) -> Option<Arc<StreamBinding>> {
        self.bindings.lock().unwrap().get(&listener).cloned()
    }
}

use std::sync::{Arc, Mutex, RwLock};

use hashbrown::HashSet;
use tracing::debug;

use crate::chunk::{Chunk, ListenerId, ResourceId};
use crate::decode::DecodeSource;
use crate::error::{BindError, LoadError};
use crate::voice::Voice;

/// Buffer mode: the whole sound is decoded into one chunk that every
/// binding plays.
#[derive(Default)]
pub(super) struct StaticBuffer {
    chunk: RwLock<Option<Arc<Chunk>>>,
    /// Listeners bound to this buffer. The lock also serializes bind, unbind
    /// and unload.
    bindings: Mutex<HashSet<ListenerId>>,
}

impl StaticBuffer {
    pub(super) fn load(&self, owner: ResourceId, source: &mut dyn DecodeSource, max_bytes: usize) -> Result<(), LoadError> {
        let _bindings = self.bindings.lock().unwrap();
        let mut slot = self.chunk.write().unwrap();

        if slot.is_some() {
            return Err(LoadError::AlreadyLoaded);
        }

        let mut chunk = Chunk::decode(owner, source, 0, max_bytes).ok_or(LoadError::EmptySource)?;

        if !chunk.is_end_of_stream() {
            debug!(
                size = source.size(),
                kept = chunk.len(),
                "source exceeds the static buffer limit, truncating"
            );
        }

        chunk.mark_end_of_stream();
        *slot = Some(Arc::new(chunk));

        Ok(())
    }

    /// Returns `false` while any listener is bound.
    pub(super) fn unload(&self) -> bool {
        let bindings = self.bindings.lock().unwrap();

        if !bindings.is_empty() {
            return false;
        }

        self.chunk.write().unwrap().take();
        true
    }

    /// Queues the buffer on `voice`. Returns `false` if the listener is
    /// already bound.
    pub(super) fn bind(&self, listener: ListenerId, voice: &Arc<dyn Voice>) -> Result<bool, BindError> {
        let mut bindings = self.bindings.lock().unwrap();
        let chunk = self.chunk().ok_or(BindError::NotLoaded)?;

        if !bindings.insert(listener) {
            return Ok(false);
        }

        voice.submit(chunk, 0);
        Ok(true)
    }

    pub(super) fn unbind(&self, listener: ListenerId, voice: &Arc<dyn Voice>) -> bool {
        let mut bindings = self.bindings.lock().unwrap();

        if !bindings.remove(&listener) {
            return false;
        }

        voice.stop();
        voice.flush();
        true
    }

    /// Requeues the buffer so that playback starts at `frame`.
    pub(super) fn seek(&self, listener: ListenerId, voice: &Arc<dyn Voice>, frame: usize) -> bool {
        let bindings = self.bindings.lock().unwrap();

        let Some(chunk) = self.chunk() else {
            return false;
        };

        if !bindings.contains(&listener) {
            return false;
        }

        let frame = match frame >= chunk.num_frames() {
            true => 0,
            false => frame,
        };

        voice.stop();
        voice.flush();
        voice.submit(chunk, frame);
        true
    }

    /// Stops `voice` and drops everything it has queued.
    pub(super) fn halt(&self, listener: ListenerId, voice: &Arc<dyn Voice>) {
        let bindings = self.bindings.lock().unwrap();

        if bindings.contains(&listener) {
            voice.stop();
            voice.flush();
        }
    }

    #[must_use]
    pub(super) fn chunk(&self) -> Option<Arc<Chunk>> {
        self.chunk.read().unwrap().clone()
    }

    #[must_use]
    pub(super) fn reference_count(&self) -> usize {
        self.bindings.lock().unwrap().len()
    }
}

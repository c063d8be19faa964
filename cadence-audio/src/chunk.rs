use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::decode::DecodeSource;
use crate::format::SampleFormat;
#[cfg(any(test, feature = "cpal"))]
use crate::frame::Frame;

/// Identifies a [`Resource`](crate::Resource). Every chunk is tagged with the
/// id of the resource that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifies a [`Listener`](crate::Listener) within the bindings of a
/// resource.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Returns an id that differs from every id returned before.
    #[must_use]
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// A block of decoded PCM audio that is handed to a [`Voice`](crate::Voice).
///
/// Chunks are shared through an [`Arc`] and never mutated while a voice
/// holds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    data: Vec<u8>,
    format: SampleFormat,
    offset: usize,
    end_of_stream: bool,
    owner: ResourceId,
}

impl Chunk {
    /// Wraps PCM that is already decoded. `data` is truncated to whole frames.
    pub(crate) fn from_pcm(owner: ResourceId, format: SampleFormat, mut data: Vec<u8>, end_of_stream: bool) -> Self {
        data.truncate(format.align_down(data.len()));
        Self {
            data,
            format,
            offset: 0,
            end_of_stream,
            owner,
        }
    }

    /// Reads at most `max_bytes` starting at byte `offset` of `source`.
    ///
    /// Returns [`None`] if there is nothing left to read at that offset.
    pub(crate) fn decode(owner: ResourceId, source: &mut dyn DecodeSource, offset: usize, max_bytes: usize) -> Option<Self> {
        let mut chunk = Self::from_pcm(owner, source.format(), Vec::new(), false);
        chunk.refill(source, offset, max_bytes).then_some(chunk)
    }

    /// Like [`decode`](Self::decode), but reuses the allocation of `self`.
    ///
    /// On failure `self` is left empty.
    pub(crate) fn refill(&mut self, source: &mut dyn DecodeSource, offset: usize, max_bytes: usize) -> bool {
        let format = source.format();
        self.data.clear();

        if source.seek(offset) != offset || source.is_end_of_stream() {
            return false;
        }

        self.data.resize(format.align_down(max_bytes.min(source.available())), 0);
        let read = source.read(&mut self.data);
        self.data.truncate(read);

        self.format = format;
        self.offset = offset;
        self.end_of_stream = source.is_end_of_stream();

        read > 0
    }

    pub(crate) fn mark_end_of_stream(&mut self) {
        self.end_of_stream = true;
    }

    /// The raw interleaved PCM bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length of the payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk holds no audio.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The layout of [`data`](Self::data).
    #[must_use]
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Byte offset of the first frame within the stream it was read from.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether this is the last chunk of its stream.
    #[must_use]
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// The resource that produced this chunk.
    #[must_use]
    pub fn owner(&self) -> ResourceId {
        self.owner
    }

    /// Length of the payload in frames.
    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.format.bytes_to_frames(self.data.len())
    }

    /// Returns the frame at `index` or silence if it is out of bounds.
    #[cfg(any(test, feature = "cpal"))]
    #[must_use]
    pub(crate) fn frame_at(&self, index: usize) -> Frame {
        let block_align = self.format.block_align();
        let start = index.saturating_mul(block_align);
        match self.data.get(start..start.saturating_add(block_align)) {
            Some(bytes) => Frame::from_pcm(bytes, self.format),
            None => Frame::ZERO,
        }
    }
}

/// A chunk held by a listener binding.
///
/// The chunk at offset zero of a stream belongs to the resource and is
/// shared by every binding, so it must never be recycled as a scratch
/// buffer. Every other chunk belongs to exactly one binding.
#[derive(Debug, Clone)]
pub(crate) enum BoundChunk {
    ResourceOwned(Arc<Chunk>),
    Transient(Arc<Chunk>),
}

impl BoundChunk {
    #[must_use]
    pub(crate) fn chunk(&self) -> &Arc<Chunk> {
        match self {
            Self::ResourceOwned(chunk) | Self::Transient(chunk) => chunk,
        }
    }

    /// Takes back ownership of a transient chunk the voice has released, so
    /// its allocation can be refilled.
    #[must_use]
    pub(crate) fn into_scratch(self) -> Option<Chunk> {
        match self {
            Self::ResourceOwned(_) => None,
            Self::Transient(chunk) => Arc::try_unwrap(chunk).ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{BoundChunk, Chunk, ResourceId};
    use crate::decode::{DecodeSource, MemorySource};
    use crate::format::SampleFormat;

    const FORMAT: SampleFormat = SampleFormat::new(1_000, 2, 16);

    fn source(frames: usize) -> MemorySource {
        let data: Vec<u8> = (0..FORMAT.frames_to_bytes(frames)).map(|index| index as u8).collect();
        MemorySource::new(FORMAT, data)
    }

    #[test]
    fn decode_reads_from_the_offset() {
        let mut source = source(10);
        let chunk = Chunk::decode(ResourceId::next(), &mut source, 8, 12).unwrap();

        assert_eq!(chunk.offset(), 8);
        assert_eq!(chunk.len(), 12);
        assert_eq!(chunk.num_frames(), 3);
        assert_eq!(chunk.data()[0], 8);
        assert!(!chunk.is_end_of_stream());
    }

    #[test]
    fn tail_chunk_is_short_and_flagged() {
        let mut source = source(10);
        let chunk = Chunk::decode(ResourceId::next(), &mut source, 32, 100).unwrap();

        assert_eq!(chunk.len(), 8);
        assert!(chunk.is_end_of_stream());
    }

    #[test]
    fn decode_past_the_end_yields_nothing() {
        let mut source = source(10);
        assert!(Chunk::decode(ResourceId::next(), &mut source, 40, 100).is_none());
        assert!(Chunk::decode(ResourceId::next(), &mut source, 400, 100).is_none());
    }

    #[test]
    fn refill_reuses_the_allocation() {
        let mut source = source(10);
        let mut chunk = Chunk::decode(ResourceId::next(), &mut source, 0, 16).unwrap();
        let pointer = chunk.data().as_ptr();

        assert!(chunk.refill(&mut source, 16, 16));
        assert_eq!(chunk.data().as_ptr(), pointer);
        assert_eq!(chunk.offset(), 16);
        assert_eq!(source.position(), 32);
    }

    #[test]
    fn out_of_range_frames_are_silent() {
        let chunk = Chunk::from_pcm(ResourceId::next(), FORMAT, vec![0xFF; 4], true);
        assert_eq!(chunk.frame_at(1).left, 0.0);
    }

    #[test]
    fn resource_owned_chunks_are_never_scratch() {
        let chunk = Arc::new(Chunk::from_pcm(ResourceId::next(), FORMAT, vec![0; 8], false));

        assert!(BoundChunk::ResourceOwned(chunk.clone()).into_scratch().is_none());
        assert!(BoundChunk::Transient(chunk.clone()).into_scratch().is_none());

        let unique = Arc::new(Chunk::clone(&chunk));
        assert!(BoundChunk::Transient(unique).into_scratch().is_some());
    }
}

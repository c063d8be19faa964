//! Sources of raw PCM data.
//!
//! A [`DecodeSource`] exposes decoded audio as a flat, byte-addressed PCM
//! stream. Resources pull chunks out of it on demand, so a source only ever
//! has to hold a small decode window in memory.
//!
//! - [`MemorySource`] serves PCM that is already in memory.
//! - [`SymphoniaSource`] decodes WAV, MP3 and OGG/Vorbis files.

mod memory;
mod probe;
mod symphonia;

use std::path::Path;

pub use memory::MemorySource;
pub use probe::AudioFileFormat;
pub use symphonia::SymphoniaSource;

use crate::error::FromFileError;
use crate::format::SampleFormat;

/// A cursor over decoded PCM bytes.
///
/// Implementations are not synchronized. Resources serialize access to a
/// shared source themselves.
pub trait DecodeSource: Send {
    /// The layout of the PCM data produced by [`read`](Self::read).
    fn format(&self) -> SampleFormat;

    /// Size of the whole stream in PCM bytes.
    fn size(&self) -> usize;

    /// Current read position in PCM bytes.
    fn position(&self) -> usize;

    /// Reads up to `destination.len()` bytes, rounded down to whole frames.
    ///
    /// Returns the number of bytes written. `0` means the end of the stream
    /// was reached or the source is not open.
    fn read(&mut self, destination: &mut [u8]) -> usize;

    /// Moves the cursor to `position` (in PCM bytes), aligned down to a whole
    /// frame. Positions at or past the end snap back to `0`.
    ///
    /// Returns the position the cursor actually ended up at.
    fn seek(&mut self, position: usize) -> usize;

    /// Number of PCM bytes left until the end of the stream.
    fn available(&self) -> usize {
        self.size().saturating_sub(self.position())
    }

    /// Whether the cursor reached the end of the stream.
    fn is_end_of_stream(&self) -> bool {
        self.position() >= self.size()
    }
}

impl<T: DecodeSource + ?Sized> DecodeSource for Box<T> {
    fn format(&self) -> SampleFormat {
        (**self).format()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn position(&self) -> usize {
        (**self).position()
    }

    fn read(&mut self, destination: &mut [u8]) -> usize {
        (**self).read(destination)
    }

    fn seek(&mut self, position: usize) -> usize {
        (**self).seek(position)
    }
}

/// Opens an audio file for streaming decode.
///
/// The container is detected from the file extension first and from the
/// file header if the extension is unknown.
pub fn open_source(path: impl AsRef<Path>) -> Result<Box<dyn DecodeSource>, FromFileError> {
    let path = path.as_ref();
    let format = AudioFileFormat::detect(path)?;
    Ok(Box::new(SymphoniaSource::from_file(path, format)?))
}

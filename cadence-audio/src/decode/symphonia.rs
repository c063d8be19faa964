use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::Decoder;
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::{AudioFileFormat, DecodeSource};
use crate::error::FromFileError;
use crate::format::SampleFormat;

/// Bits per sample of the PCM produced by [`SymphoniaSource`].
const OUTPUT_BITS_PER_SAMPLE: u16 = 16;

/// Decodes a compressed or container-wrapped file into 16-bit interleaved PCM.
///
/// Only a single decoded packet is held in memory. Sequential reads never
/// touch the format reader's seek machinery.
pub struct SymphoniaSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    format: SampleFormat,
    size: usize,
    position: usize,
    sample_buffer: Option<SampleBuffer<i16>>,
    pending: Vec<u8>,
    pending_offset: usize,
    /// Bytes to discard after a seek landed before the requested frame.
    skip_bytes: usize,
}

impl SymphoniaSource {
    /// Opens the file at `path`, using `format` as a hint for the prober.
    pub fn from_file(path: impl AsRef<Path>, format: AudioFileFormat) -> Result<Self, FromFileError> {
        let path = path.as_ref();
        debug!(path = %path.display(), ?format, "opening audio file");

        let mut hint = Hint::new();
        hint.with_extension(format.extension());
        Self::from_media_source(Box::new(File::open(path)?), hint)
    }

    /// Opens any type that implements Symphonia's [`MediaSource`] trait.
    pub fn from_media_source(media_source: Box<dyn MediaSource>, hint: Hint) -> Result<Self, FromFileError> {
        let codecs = symphonia::default::get_codecs();
        let probe = symphonia::default::get_probe();
        let media_source_stream = MediaSourceStream::new(media_source, Default::default());
        let mut format_reader = probe
            .format(&hint, media_source_stream, &Default::default(), &Default::default())?
            .format;

        let default_track = format_reader.default_track().ok_or(FromFileError::NoDefaultTrack)?;
        let track_id = default_track.id;
        let codec_params = default_track.codec_params.clone();
        let sample_rate = codec_params.sample_rate.ok_or(FromFileError::UnknownSampleRate)?;
        let channels = codec_params
            .channels
            .map(|channels| channels.count() as u16)
            .ok_or(FromFileError::UnknownChannelCount)?;
        let decoder = codecs.make(&codec_params, &Default::default())?;
        let format = SampleFormat::new(sample_rate, channels, OUTPUT_BITS_PER_SAMPLE);

        let num_frames = match codec_params.n_frames {
            Some(num_frames) => num_frames as usize,
            None => {
                let num_frames = count_frames(format_reader.as_mut(), track_id)?;
                format_reader.seek(SeekMode::Accurate, SeekTo::TimeStamp { ts: 0, track_id })?;
                num_frames
            }
        };

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            format,
            size: format.frames_to_bytes(num_frames),
            position: 0,
            sample_buffer: None,
            pending: Vec::new(),
            pending_offset: 0,
            skip_bytes: 0,
        })
    }

    /// Decodes the next packet of the default track into `pending`.
    ///
    /// Returns `Ok(false)` at the end of the stream.
    fn decode_next(&mut self) -> Result<bool, Error> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(error)) if error.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(false),
                Err(error) => return Err(error),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::DecodeError(error)) => {
                    debug!(error, "skipping malformed packet");
                    continue;
                }
                Err(error) => return Err(error),
            };

            let spec = *decoded.spec();
            let required = decoded.capacity() * spec.channels.count();

            if self.sample_buffer.as_ref().is_some_and(|buffer| buffer.capacity() < required) {
                self.sample_buffer = None;
            }

            let sample_buffer = self
                .sample_buffer
                .get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
            sample_buffer.copy_interleaved_ref(decoded);

            self.pending.clear();
            self.pending
                .extend(sample_buffer.samples().iter().flat_map(|sample| sample.to_le_bytes()));

            let skipped = self.skip_bytes.min(self.pending.len());
            self.pending_offset = skipped;
            self.skip_bytes -= skipped;

            if self.pending_offset < self.pending.len() {
                return Ok(true);
            }
        }
    }

    fn seek_to_frame(&mut self, frame: usize) -> Result<(), Error> {
        let seeked_to = self.format_reader.seek(SeekMode::Accurate, SeekTo::TimeStamp {
            ts: frame as u64,
            track_id: self.track_id,
        })?;
        self.decoder.reset();

        let frames_to_skip = seeked_to.required_ts.saturating_sub(seeked_to.actual_ts) as usize;
        self.skip_bytes = self.format.frames_to_bytes(frames_to_skip);
        self.pending.clear();
        self.pending_offset = 0;

        Ok(())
    }
}

impl DecodeSource for SymphoniaSource {
    fn format(&self) -> SampleFormat {
        self.format
    }

    fn size(&self) -> usize {
        self.size
    }

    fn position(&self) -> usize {
        self.position
    }

    fn read(&mut self, destination: &mut [u8]) -> usize {
        let wanted = self.format.align_down(destination.len().min(self.available()));
        let mut written = 0;

        while written < wanted {
            if self.pending_offset == self.pending.len() {
                match self.decode_next() {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(error) => {
                        warn!(%error, "decoding failed, ending the stream");
                        break;
                    }
                }
            }

            let count = (wanted - written).min(self.pending.len() - self.pending_offset);
            destination[written..written + count].copy_from_slice(&self.pending[self.pending_offset..self.pending_offset + count]);
            self.pending_offset += count;
            written += count;
        }

        let written = self.format.align_down(written);
        self.position += written;

        // The decoder ran dry before the reported length. Treat what was
        // decoded as the whole stream.
        if written < wanted {
            self.size = self.position;
        }

        written
    }

    fn seek(&mut self, position: usize) -> usize {
        let position = match position >= self.size {
            true => 0,
            false => self.format.align_down(position),
        };

        if position == self.position {
            return position;
        }

        match self.seek_to_frame(self.format.bytes_to_frames(position)) {
            Ok(()) => self.position = position,
            Err(error) => {
                warn!(%error, position, "seeking failed, ending the stream");
                self.position = self.size;
            }
        }

        self.position
    }
}

fn count_frames(format_reader: &mut dyn FormatReader, track_id: u32) -> Result<usize, FromFileError> {
    let mut num_frames = 0;

    loop {
        match format_reader.next_packet() {
            Ok(packet) if packet.track_id() == track_id => num_frames += packet.dur as usize,
            Ok(_) => {}
            Err(Error::IoError(error)) if error.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(error) => return Err(error.into()),
        }
    }

    Ok(num_frames)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use symphonia::core::probe::Hint;

    use super::SymphoniaSource;
    use crate::decode::DecodeSource;
    use crate::format::SampleFormat;

    const FORMAT: SampleFormat = SampleFormat::new(8_000, 1, 16);

    fn wav_file(pcm: &[u8]) -> Vec<u8> {
        let mut file = Vec::new();
        file.extend_from_slice(b"RIFF");
        file.extend_from_slice(&(36 + pcm.len() as u32).to_le_bytes());
        file.extend_from_slice(b"WAVEfmt ");
        file.extend_from_slice(&16u32.to_le_bytes());
        file.extend_from_slice(&1u16.to_le_bytes());
        file.extend_from_slice(&FORMAT.channels.to_le_bytes());
        file.extend_from_slice(&FORMAT.sample_rate.to_le_bytes());
        file.extend_from_slice(&(FORMAT.bytes_per_second() as u32).to_le_bytes());
        file.extend_from_slice(&(FORMAT.block_align() as u16).to_le_bytes());
        file.extend_from_slice(&FORMAT.bits_per_sample.to_le_bytes());
        file.extend_from_slice(b"data");
        file.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
        file.extend_from_slice(pcm);
        file
    }

    fn ramp(frames: usize) -> Vec<u8> {
        (0..frames as i16).flat_map(|sample| sample.to_le_bytes()).collect()
    }

    fn open(pcm: &[u8]) -> SymphoniaSource {
        let mut hint = Hint::new();
        hint.with_extension("wav");
        SymphoniaSource::from_media_source(Box::new(Cursor::new(wav_file(pcm))), hint).unwrap()
    }

    #[test]
    fn reports_the_format_and_size() {
        let pcm = ramp(3_000);
        let source = open(&pcm);

        assert_eq!(source.format(), FORMAT);
        assert_eq!(source.size(), pcm.len());
        assert_eq!(source.position(), 0);
    }

    #[test]
    fn sequential_reads_reproduce_the_pcm() {
        let pcm = ramp(3_000);
        let mut source = open(&pcm);
        let mut decoded = Vec::new();
        let mut buffer = [0; 1_000];

        loop {
            let count = source.read(&mut buffer);
            if count == 0 {
                break;
            }
            decoded.extend_from_slice(&buffer[..count]);
        }

        assert_eq!(decoded, pcm);
        assert!(source.is_end_of_stream());
    }

    #[test]
    fn seek_lands_on_the_requested_frame() {
        let pcm = ramp(3_000);
        let mut source = open(&pcm);
        let mut buffer = [0; 64];

        assert_eq!(source.seek(4_001), 4_000);
        assert_eq!(source.read(&mut buffer), 64);
        assert_eq!(&buffer[..], &pcm[4_000..4_064]);

        assert_eq!(source.seek(pcm.len()), 0);
        assert_eq!(source.read(&mut buffer), 64);
        assert_eq!(&buffer[..], &pcm[..64]);
    }
}

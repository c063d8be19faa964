use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::FromFileError;

/// The container formats the engine can stream from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFileFormat {
    /// RIFF WAVE with PCM samples.
    Wav,
    /// MPEG-1/2 Layer III.
    Mp3,
    /// Vorbis in an OGG container.
    Ogg,
}

impl AudioFileFormat {
    /// Classifies a file by its extension first and by sniffing its header
    /// second.
    pub fn detect(path: impl AsRef<Path>) -> Result<Self, FromFileError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;

        if let Some(format) = Self::from_extension(path) {
            return Ok(format);
        }

        let mut header = [0; 12];
        let length = read_up_to(&mut file, &mut header)?;

        Self::from_header(&header[..length]).ok_or_else(|| FromFileError::UnsupportedFormat(path.to_path_buf()))
    }

    /// Identifies a container by the extension of `path`, ignoring case.
    #[must_use]
    pub fn from_extension(path: impl AsRef<Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::Mp3),
            "ogg" => Some(Self::Ogg),
            _ => None,
        }
    }

    /// Identifies a container from the first bytes of a file.
    ///
    /// WAV needs 12 bytes (`RIFF` at 0 and `WAVE` at 8), OGG needs the 4
    /// byte capture pattern and MP3 is recognized by an ID3v2 tag or an
    /// MPEG frame sync.
    #[must_use]
    pub fn from_header(header: &[u8]) -> Option<Self> {
        match header {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some(Self::Wav),
            [b'O', b'g', b'g', b'S', ..] => Some(Self::Ogg),
            [b'I', b'D', b'3', ..] => Some(Self::Mp3),
            [0xFF, second, ..] if second & 0xE0 == 0xE0 => Some(Self::Mp3),
            _ => None,
        }
    }

    /// The extension passed to the decoder as a hint.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
        }
    }
}

fn read_up_to(file: &mut File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut length = 0;
    while length < buffer.len() {
        match file.read(&mut buffer[length..])? {
            0 => break,
            count => length += count,
        }
    }
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::AudioFileFormat;
    use crate::error::FromFileError;

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(AudioFileFormat::from_extension("music/theme.OGG"), Some(AudioFileFormat::Ogg));
        assert_eq!(AudioFileFormat::from_extension("shot.wav"), Some(AudioFileFormat::Wav));
        assert_eq!(AudioFileFormat::from_extension("voice.mp3"), Some(AudioFileFormat::Mp3));
        assert_eq!(AudioFileFormat::from_extension("notes.txt"), None);
        assert_eq!(AudioFileFormat::from_extension("no_extension"), None);
    }

    #[test]
    fn header_sniffing() {
        assert_eq!(AudioFileFormat::from_header(b"RIFF\x24\0\0\0WAVEfmt "), Some(AudioFileFormat::Wav));
        assert_eq!(AudioFileFormat::from_header(b"OggS\0\x02"), Some(AudioFileFormat::Ogg));
        assert_eq!(AudioFileFormat::from_header(b"ID3\x04\0\0"), Some(AudioFileFormat::Mp3));
        assert_eq!(AudioFileFormat::from_header(&[0xFF, 0xFB, 0x90, 0x64]), Some(AudioFileFormat::Mp3));
        assert_eq!(AudioFileFormat::from_header(b"RIFF\x24\0\0\0AVI "), None);
        assert_eq!(AudioFileFormat::from_header(b""), None);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = AudioFileFormat::detect("does/not/exist.wav");
        assert!(matches!(result, Err(FromFileError::Io(error)) if error.kind() == std::io::ErrorKind::NotFound));
    }
}

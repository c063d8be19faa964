use std::path::PathBuf;

use thiserror::Error;

/// The audio device is missing or could not be brought up.
#[derive(Debug, Error)]
pub enum SetupError {
    /// A sound can't be created or played before the device is initialized.
    #[error("the audio device is not initialized")]
    DeviceNotInitialized,
    /// The backend reported an error while setting up the device or a voice.
    #[error("audio backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// The mixer can't hold any more voices.
#[derive(Debug, Error)]
#[error("could not add a voice because the maximum number of voices has been reached")]
pub struct VoiceLimitReached;

/// Errors that can occur when opening an audio file for decoding.
#[derive(Debug, Error)]
pub enum FromFileError {
    /// The file could not be found or read.
    #[error("could not read the audio file: {0}")]
    Io(#[from] std::io::Error),
    /// Neither the extension nor the header identify a supported format.
    #[error("{0} was not found or has an unsupported format")]
    UnsupportedFormat(PathBuf),
    /// The file doesn't have a default track.
    #[error("the audio file does not contain a default track")]
    NoDefaultTrack,
    /// The sample rate of the audio could not be determined.
    #[error("the sample rate of the audio could not be determined")]
    UnknownSampleRate,
    /// The channel layout of the audio could not be determined.
    #[error("the channel count of the audio could not be determined")]
    UnknownChannelCount,
    /// The decoder rejected the file.
    #[error("could not decode the audio file: {0}")]
    Symphonia(#[from] symphonia::core::errors::Error),
}

/// Errors that can occur when loading a [`Resource`](crate::Resource).
#[derive(Debug, Error)]
pub enum LoadError {
    /// The device is not ready.
    #[error(transparent)]
    Setup(#[from] SetupError),
    /// The audio file could not be opened.
    #[error(transparent)]
    File(#[from] FromFileError),
    /// The resource already holds audio and must be unloaded first.
    #[error("the resource is already loaded")]
    AlreadyLoaded,
    /// The decode source didn't produce any audio.
    #[error("the decode source does not contain any audio")]
    EmptySource,
}

/// Errors that can occur when binding a listener to a resource.
#[derive(Debug, Error)]
pub enum BindError {
    /// Only a loaded resource can be played.
    #[error("the resource has no audio loaded")]
    NotLoaded,
}

/// Errors that can occur when starting playback.
#[derive(Debug, Error)]
pub enum PlayError {
    /// The listener was never given a resource.
    #[error("there is nothing to play")]
    NothingToPlay,
    /// The device is not ready.
    #[error(transparent)]
    Setup(#[from] SetupError),
    /// The listener could not be bound to the resource.
    #[error(transparent)]
    Bind(#[from] BindError),
}

/// Errors that can occur when reading or writing [`AudioSettings`](crate::AudioSettings).
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read or written.
    #[error("could not access the settings file: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid RON.
    #[error("could not parse the settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// The settings could not be turned into RON.
    #[error("could not serialize the settings: {0}")]
    Serialize(#[from] ron::Error),
}

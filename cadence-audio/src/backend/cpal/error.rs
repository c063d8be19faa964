use thiserror::Error;

use crate::error::VoiceLimitReached;

/// Errors that can occur when using the cpal backend.
#[derive(Debug, Error)]
pub enum Error {
    /// A default audio output device could not be determined.
    #[error("cannot find the default audio output device")]
    NoDefaultOutputDevice,
    /// An error occurred when building the audio stream.
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
    /// An error occurred when starting the audio stream.
    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),
    /// The stream manager thread stopped before reporting whether the
    /// stream started.
    #[error("the audio stream thread exited unexpectedly")]
    StreamManagerExited,
    /// The mixer has no room for another voice.
    #[error(transparent)]
    VoiceLimitReached(#[from] VoiceLimitReached),
}

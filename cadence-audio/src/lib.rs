//! This crate exposes a streaming audio playback engine
//!
//! Audio is loaded into a [`Resource`], either decoded completely up front or
//! streamed from its [`DecodeSource`] in chunks of a fixed length. A
//! [`Listener`] binds to a resource and plays it on a voice of the
//! [`AudioDevice`]. While a stream is playing, every binding keeps two chunks
//! queued: the one playing and the one behind it. The chunk that finished is
//! refilled with the next part of the stream as soon as the voice reports it
//! consumed.
//!
//! ```no_run
//! # #[cfg(feature = "cpal")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use cadence_audio::backend::cpal::CpalBackend;
//! use cadence_audio::{AudioDevice, AudioSettings, Listener, Resource, ResourceKind};
//!
//! let device = AudioDevice::<CpalBackend>::new(AudioSettings::default());
//! device.initialize(Default::default())?;
//!
//! let resource = Arc::new(Resource::from_file(ResourceKind::Streaming, &device, "music.ogg")?);
//! let listener = Listener::new(&device);
//! listener.play_resource(resource, true, true, 0.8)?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "cpal"))]
//! # fn main() {}
//! ```
#![warn(missing_docs)]

pub mod backend;
mod chunk;
pub mod decode;
mod device;
mod error;
mod format;
#[cfg(any(test, feature = "cpal"))]
mod frame;
mod listener;
mod resource;
mod settings;
mod state;
mod voice;

pub use backend::Backend;
pub use chunk::{Chunk, ListenerId, ResourceId};
pub use decode::{AudioFileFormat, DecodeSource, MemorySource, SymphoniaSource, open_source};
pub use device::AudioDevice;
pub use error::{BindError, FromFileError, LoadError, PlayError, SettingsError, SetupError, VoiceLimitReached};
pub use format::SampleFormat;
pub use listener::Listener;
pub use resource::{Resource, ResourceKind};
pub use settings::AudioSettings;
pub use state::PlaybackStatus;
pub use voice::{ChunkEvent, Voice, VoiceEvents};

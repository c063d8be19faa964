//! Plays an audio file from the command line.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use cadence_audio::backend::cpal::CpalBackend;
use cadence_audio::{AudioDevice, AudioSettings, Listener, PlaybackStatus, Resource, ResourceKind};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(about = "Plays a WAV, MP3 or OGG file")]
struct Args {
    /// The file to play.
    path: PathBuf,
    /// Decode the file while playing instead of up front.
    #[arg(long)]
    stream: bool,
    /// Start over when the end is reached.
    #[arg(long = "loop")]
    looping: bool,
    /// Playback volume between 0 and 1.
    #[arg(long, default_value_t = 1.0)]
    volume: f32,
    /// Frame to start playing from.
    #[arg(long)]
    seek: Option<usize>,
    /// Audio settings in RON format.
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let settings = args.settings.as_ref().map(AudioSettings::new).unwrap_or_default();
    let device = AudioDevice::<CpalBackend>::new(settings);
    device.initialize(Default::default())?;

    let kind = match args.stream {
        true => ResourceKind::Streaming,
        false => ResourceKind::Static,
    };
    let resource = Arc::new(Resource::from_file(kind, &device, &args.path)?);

    if let Some(format) = resource.format() {
        info!(
            path = %args.path.display(),
            ?kind,
            sample_rate = format.sample_rate,
            channels = format.channels,
            frames = resource.size(),
            "loaded"
        );
    }

    let listener = Listener::new(&device);
    listener.play_resource(Arc::clone(&resource), args.looping, false, args.volume)?;

    if let Some(frame) = args.seek {
        listener.seek(frame);
    }

    listener.play()?;

    while listener.status() != PlaybackStatus::Stopped {
        sleep(Duration::from_millis(250));
        info!(
            position = listener.playback_position(),
            size = listener.playback_size(),
            "playing"
        );
    }

    drop(listener);
    resource.unload();
    device.finalize();

    Ok(())
}

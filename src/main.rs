// Beat preview player - terminal front end for the playback coordinator
// Plays one demo (local file or storefront URL) in the mini-player

use anyhow::{Context, Result};
use beatplayer::{
    audio::{rodio_backend::RodioBackend, track::resolve_url, PlayerService, PlayerSettings, TrackId, TrackRequest},
    config::Config,
    ui::MiniPlayer,
};
use clap::Parser;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beatplayer")]
#[command(about = "Preview beats from the storefront in the terminal")]
struct Args {
    /// Local file, absolute URL, or a demo path like /static/demos/12.mp3
    source: String,

    /// Title shown in the player
    #[arg(long)]
    title: Option<String>,

    /// Beat id; defaults to the source itself
    #[arg(long)]
    id: Option<String>,

    /// Starting volume, 0.0 to 1.0
    #[arg(long)]
    volume: Option<f32>,

    /// Enable developer logging (debug output for every target)
    #[arg(long)]
    dev: bool,
}

fn init_logging(config: &Config, dev: bool) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = &config.logging.directory;
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    // Daily rotating file appender; the terminal belongs to the mini-player
    let file_appender = tracing_appender::rolling::daily(log_dir, "beatplayer.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = if dev {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter))
    };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if dev {
        eprintln!("Dev mode: debug output going to {}", log_dir.display());
    }

    Ok(guard)
}

fn track_from_args(args: &Args, config: &Config) -> TrackRequest {
    let url = if Path::new(&args.source).exists() {
        args.source.clone()
    } else {
        resolve_url(&config.catalog.api_base_url, &args.source)
    };

    let title = args.title.clone().unwrap_or_else(|| {
        Path::new(&args.source)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let id = args.id.clone().map(TrackId::new).unwrap_or_else(|| TrackId::new(args.source.clone()));

    TrackRequest::new(id, url, title)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config - falls back to defaults if missing
    let config = Config::load()?;
    let _guard = init_logging(&config, args.dev)?;

    let mut settings = PlayerSettings::from(&config);
    if let Some(volume) = args.volume {
        settings.volume = volume.clamp(0.0, 1.0);
    }

    // The output stream must outlive every sink, so it stays on this frame
    let (_stream, stream_handle) = rodio::OutputStream::try_default()
        .context("no audio output device available")?;
    let backend = RodioBackend::new(stream_handle, settings.progress_interval)?;

    let (service, player) = PlayerService::new(backend, settings);
    let service_task = tokio::spawn(service.run());

    let track = track_from_args(&args, &config);
    info!("Previewing {} from {}", track.display_title(), track.url);

    let result = match MiniPlayer::new(player.clone(), track) {
        Ok(mut mini_player) => mini_player.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        error!("Mini-player exited with error: {:#}", e);
    }

    player.shutdown()?;
    service_task.await?;

    result
}

//! soundsride — in-vehicle genre-aware audio mixing engine.
//!
//! Decodes song snippets, schedules cross-fades against a forecast of
//! upcoming route-genre transitions, and serves the result over HTTP.
//! Grounded on wkmp-ap's `main.rs` startup sequence.

use anyhow::{Context, Result};
use clap::Parser;
use soundsride::api::server::{self, AppContext};
use soundsride::audio::sink::CpalSinkFactory;
use soundsride::config::Config;
use soundsride::library::SnippetLibrary;
use soundsride::segment::AudioFormat;
use soundsride::session::SessionRegistry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "soundsride")]
#[command(about = "Genre-aware audio mixing engine for vehicle head units")]
#[command(version)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "soundsride.toml")]
    config: PathBuf,

    /// Snippet library directory (overrides config file).
    #[arg(short, long)]
    library: Option<PathBuf>,

    /// HTTP server port (overrides config file).
    #[arg(short, long)]
    port: Option<u16>,
}

/// Scan `dir` for `(X.mp3, X.txt)` pairs, probing each song's duration via
/// symphonia so the final phase's snippet can be clamped correctly
/// (section 6's on-disk library layout).
async fn load_library(dir: &std::path::Path) -> Result<SnippetLibrary> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read library directory {}", dir.display()))?;

    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let audio_path = path.with_extension("mp3");
        if !audio_path.exists() {
            warn!(phase_file = %path.display(), "no matching audio file, skipping");
            continue;
        }

        let phase_contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read phase file {}", path.display()))?;

        let (samples, sample_rate, channels) =
            soundsride::audio::decode::decode_file(&audio_path)
                .with_context(|| format!("failed to probe duration of {}", audio_path.display()))?;
        let duration_ms = (samples.len() as i64 / channels.max(1) as i64 * 1000) / sample_rate.max(1) as i64;

        entries.push((audio_path, phase_contents, duration_ms));
    }

    Ok(SnippetLibrary::from_phase_files(entries)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soundsride=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true).with_file(true).with_line_number(true))
        .init();

    info!("starting soundsride");

    let args = Args::parse();
    info!(config = ?args.config, "loading configuration");

    let config = Config::load(&args.config, args.port, args.library).await?;
    info!(library = %config.library_path.display(), port = config.port, "configuration loaded");

    let library = Arc::new(load_library(&config.library_path).await?);
    info!(genres = library.genre_count(), "snippet library indexed");

    let output_format = AudioFormat::default();
    let sink_factory = Arc::new(CpalSinkFactory { device_name: config.audio_device.clone() });

    let ctx = AppContext {
        registry: Arc::new(SessionRegistry::default()),
        config: Arc::new(config),
        library,
        sessions: Arc::new(RwLock::new(HashMap::new())),
        output_format,
        viz_worker_count: 4,
        sink_factory,
    };

    server::run(ctx).await?;

    info!("soundsride shutting down");
    Ok(())
}

//! videopose command line: inspect and replay pose recordings.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use videopose::capture::{spawn_driver, DriverConfig};
use videopose::control::{format_time, ControlStateMachine, Playback};
use videopose::sink::LogSink;
use videopose::storage::{load_recording, FileFetcher};
use videopose::{PlayerConfig, PosePlayer, SystemClock};

#[derive(Parser)]
#[command(name = "videopose")]
#[command(about = "Inspect and replay pose keyframe recordings")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a summary of a recording
    Inspect {
        /// Path or file:// URI of the recording
        uri: String,
    },

    /// Replay a recording, logging every redraw
    Replay {
        /// Path or file:// URI of the recording
        uri: String,

        /// Player configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Playback rate multiplier
        #[arg(short, long)]
        rate: Option<f64>,

        /// Loop until interrupted
        #[arg(long = "loop")]
        looping: bool,

        /// Display refresh rate
        #[arg(long, default_value_t = 60)]
        fps: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    videopose::init_tracing();
    tracing::info!("Starting videopose v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    match args.command {
        Command::Inspect { uri } => inspect(&uri).await,
        Command::Replay {
            uri,
            config,
            rate,
            looping,
            fps,
        } => replay(&uri, config, rate, looping, fps).await,
    }
}

async fn inspect(uri: &str) -> Result<()> {
    let fetcher = FileFetcher::new();
    let recording = load_recording(&fetcher, uri)
        .await
        .with_context(|| format!("Failed to load {}", uri))?;

    println!("recording: {}", uri);
    println!("keyframes: {}", recording.len());
    println!(
        "duration:  {} ({:.0}ms)",
        format_time(recording.duration()),
        recording.duration()
    );
    println!("subjects:  {}", recording.subject_count());
    println!(
        "audio:     {}",
        if recording.audio().is_some() { "yes" } else { "no" }
    );
    Ok(())
}

async fn replay(
    uri: &str,
    config_path: Option<PathBuf>,
    rate: Option<f64>,
    looping: bool,
    fps: u32,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => PlayerConfig::load(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => PlayerConfig::default(),
    };
    if let Some(rate) = rate {
        config.playback_rate = rate;
    }
    config.loop_on_end |= looping;
    config.auto_start = true;
    config.validate()?;

    let mut player = PosePlayer::new(
        Arc::new(SystemClock::new()),
        config.clone(),
        Arc::new(FileFetcher::new()),
    );
    player.attach_sink(Box::new(LogSink::new()));
    player
        .load(uri)
        .await
        .with_context(|| format!("Failed to load {}", uri))?;

    let duration = player.state().duration;
    let machine = ControlStateMachine::new(player);
    let handle = spawn_driver(machine, DriverConfig::with_fps(fps));

    match run_time(duration, config.playback_rate, config.loop_on_end) {
        Some(run_for) => {
            tokio::select! {
                _ = tokio::time::sleep(run_for) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tracing::info!("Playing until interrupted; press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
        }
    }

    let machine = handle.join().await?;
    let state = machine.state();
    tracing::info!(
        "Replay stopped at {} of {}",
        format_time(state.current_time),
        format_time(state.duration)
    );
    Ok(())
}

/// Wall time a non-looping replay needs; `None` when it is unbounded
fn run_time(duration_ms: f64, rate: f64, looping: bool) -> Option<Duration> {
    if looping {
        return None;
    }
    let playback = Duration::try_from_secs_f64(duration_ms / rate / 1000.0).ok()?;
    playback.checked_add(Duration::from_millis(250))
}

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use danmaku_overlay_core::{
    load_comments, AnimationScheduler, Animator, AppConfig, AssetStore, FrameOutcome,
    HeadlessBackend, ManualTimer, MediaClock, ParticleField, Player, SimulatedMedia, DEFAULT_FONT,
};
use tracing_subscriber::EnvFilter;

fn main() -> danmaku_overlay_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Danmaku {
            comments,
            seek,
            seconds,
            font,
        } => run_danmaku(&config, &comments, seek, seconds, font),
        Commands::Particles { image, seconds } => run_particles(&config, &image, seconds),
        Commands::Inspect { comments, output } => run_inspect(&comments, output.as_deref()),
    }
}

fn run_danmaku(
    config: &AppConfig,
    path: &Path,
    seek: Option<f64>,
    seconds: f64,
    font: Option<PathBuf>,
) -> danmaku_overlay_core::Result<()> {
    tracing::info!(?path, "starting danmaku playback");

    let xml = std::fs::read_to_string(path)?;
    let comments = load_comments(&xml);
    let scheduler = AnimationScheduler::from_comments(&comments, &config.viewport);

    let font = font.or_else(|| config.assets.font.clone());
    let mut assets = AssetStore::new();
    if font.is_some() {
        assets.register_font(DEFAULT_FONT, font);
    }

    let timer = ManualTimer::new();
    let media = SimulatedMedia::new(scheduler.end_time().max(seconds), timer.clone());
    let clock = MediaClock::with_timer(media, timer.clone());
    let mut player = Player::new(clock, scheduler, HeadlessBackend::new(), assets);
    if player.assets().asset(DEFAULT_FONT).is_some() {
        player.load_asset(DEFAULT_FONT)?;
        let families = comments.iter().map(|comment| comment.motion.family.as_deref());
        for (family, err) in player.assets().unresolved_fonts(families) {
            tracing::warn!(%family, %err, "font family referenced by comments is unavailable");
        }
    }

    if !config.playback.show_overlay {
        player.toggle_overlay()?;
    }

    player.play();
    if let Some(position) = seek {
        player.seek(position)?;
    }

    drive(&mut player, &timer, config.playback.frame_interval_ms, seconds, |player| {
        tracing::info!(
            time = %player.status().current,
            active = player.animator().active_count(),
            finished = player.animator().finished_count(),
            live = player.backend().live_count(),
            "playback"
        );
    })?;

    let stats = player.backend().stats();
    tracing::info!(
        items = player.animator().len(),
        created = stats.created,
        destroyed = stats.destroyed,
        frames = stats.frames,
        "danmaku playback finished"
    );
    Ok(())
}

fn run_particles(config: &AppConfig, path: &Path, seconds: f64) -> danmaku_overlay_core::Result<()> {
    tracing::info!(?path, "starting particle dissolve");

    let image = image::open(path)?.to_rgba8();
    let mut field = ParticleField::from_image(&image, config.particles.clone());
    let mut backend = HeadlessBackend::new();
    field.spawn_backdrop(&mut backend)?;

    tracing::info!(
        points = field.point_count(),
        total_ms = field.total_duration_ms(),
        "dissolve scheduled"
    );

    let timer = ManualTimer::new();
    let media = SimulatedMedia::new(seconds, timer.clone());
    let clock = MediaClock::with_timer(media, timer.clone());
    let mut player = Player::new(clock, field, backend, AssetStore::new());

    player.play();
    drive(&mut player, &timer, config.playback.frame_interval_ms, seconds, |player| {
        tracing::info!(
            time = %player.status().current,
            live = player.animator().live_count(),
            "dissolve"
        );
    })?;

    let stats = player.backend().stats();
    tracing::info!(
        points = player.animator().point_count(),
        complete = player.animator().is_complete(),
        created = stats.created,
        destroyed = stats.destroyed,
        "particle dissolve finished"
    );
    Ok(())
}

fn run_inspect(path: &Path, output: Option<&Path>) -> danmaku_overlay_core::Result<()> {
    tracing::info!(?path, "inspecting comment document");
    let xml = std::fs::read_to_string(path)?;
    let comments = load_comments(&xml);
    let json = serde_json::to_string_pretty(&comments)?;

    match output {
        Some(output) => std::fs::write(output, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

/// Simulates the display refresh loop until the media stops, the animation
/// completes, or `seconds` of wall time have passed, reporting roughly once
/// per second.
fn drive<A: Animator>(
    player: &mut Player<SimulatedMedia, A, HeadlessBackend>,
    timer: &ManualTimer,
    frame_interval_ms: f64,
    seconds: f64,
    mut report: impl FnMut(&Player<SimulatedMedia, A, HeadlessBackend>),
) -> danmaku_overlay_core::Result<()> {
    let frame_interval_ms = frame_interval_ms.max(1.0);
    let frames = (seconds * 1000.0 / frame_interval_ms).ceil() as usize;
    let report_every = (1000.0 / frame_interval_ms).round().max(1.0) as usize;

    for frame in 1..=frames {
        timer.advance(frame_interval_ms);
        let outcome = player.frame()?;
        if frame % report_every == 0 {
            report(player);
        }
        if outcome == FrameOutcome::Stopped {
            tracing::info!(frame, "media stopped");
            break;
        }
        if player.animator().is_complete() {
            tracing::info!(frame, "animation complete");
            break;
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Animated danmaku overlays and particle dissolves", long_about = None)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play the advanced comments of an XML comment document headlessly.
    Danmaku {
        /// Path to the XML comment document.
        comments: PathBuf,
        /// Jump to this media position (seconds) right after starting.
        #[arg(long)]
        seek: Option<f64>,
        /// How much wall time to simulate.
        #[arg(long, default_value_t = 30.0)]
        seconds: f64,
        /// Font file every text item is rendered with.
        #[arg(long)]
        font: Option<PathBuf>,
    },
    /// Dissolve an image into particles headlessly.
    Particles {
        /// Image to decompose; pixels with zero alpha are skipped.
        image: PathBuf,
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,
    },
    /// Decode a comment document and print the advanced comments as JSON.
    Inspect {
        comments: PathBuf,
        /// Write the JSON here instead of standard output.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

use sprite_loom::cli::Args;
use sprite_loom::core::PlaybackClock;
use sprite_loom::entities::{Project, Timeline};
use sprite_loom::export::{
    ExportFormat, ExportSettings, ExportStage, FileImageResolver, spawn_export,
};
use sprite_loom::paths::{self, PathConfig};
use sprite_loom::settings::{LoomSettings, SETTINGS_FILE};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| paths::data_file("loom.log", path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging; RUST_LOG wins if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Print the tweened render list for `frame` as JSON.
fn inspect(timeline: &Timeline, frame: f32) -> Result<()> {
    let items = timeline.composite_frame_states(frame);
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}

/// Headless playback on the wall-clock scheduler.
fn play(timeline: &mut Timeline, max_ticks: Option<u32>) -> Result<()> {
    let mut clock = PlaybackClock::new();
    let ticks = clock.scheduler().ticks();
    // One pass through the timeline unless told otherwise
    let limit = max_ticks.unwrap_or(timeline.frame_count());
    let timeout = Duration::from_millis(timeline.frame_interval_ms() * 4 + 1000);

    clock.play(timeline);
    let mut n = 0;
    while clock.is_playing() && n < limit {
        let tick = ticks
            .recv_timeout(timeout)
            .map_err(|e| anyhow!("Playback clock stalled: {}", e))?;
        n += 1;
        if let Some(frame) = clock.on_tick(timeline, tick) {
            let layers = timeline.composite_frame_states(frame as f32);
            println!("frame {:>4}: {} layer(s)", frame, layers.len());
        }
    }
    clock.pause(timeline);
    info!("Playback finished at frame {} after {} ticks", timeline.current_frame(), n);
    Ok(())
}

fn run_export(
    args: &Args,
    project: &Project,
    settings: &LoomSettings,
    format: ExportFormat,
) -> Result<()> {
    // Settings < project canvas < CLI flags
    let mut base = settings.export.clone();
    if let Some(canvas) = project.canvas {
        base.width = canvas.width;
        base.height = canvas.height;
    }
    let export_settings: ExportSettings = args.export_settings(base);

    let asset_root = args
        .assets
        .clone()
        .or_else(|| settings.asset_root.clone())
        .or_else(|| args.project.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    debug!("Asset root: {}", asset_root.display());
    let resolver = Arc::new(FileImageResolver::new(asset_root));

    let job = spawn_export(project.timeline.clone(), export_settings, format, resolver)
        .context("Failed to start export worker")?;
    for p in job.progress().iter() {
        match p.stage {
            ExportStage::Rendering => info!("Rendered {}/{}", p.current_frame, p.total_frames),
            stage => debug!("Export stage {:?} ({:.0}%)", stage, p.fraction() * 100.0),
        }
    }
    let artifact = job.wait().with_context(|| format!("{} export failed", format))?;

    let out = args.output_path(artifact.extension());
    artifact
        .write_to(&out)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("{} written to {} ({} bytes)", format, out.display(), artifact.bytes().len());
    Ok(())
}

fn print_summary(project: &Project) {
    let tl = &project.timeline;
    println!(
        "{} frame(s) at {} fps, loop {}",
        tl.frame_count(),
        tl.fps(),
        if tl.looping() { "on" } else { "off" }
    );
    for thread in tl.threads() {
        println!(
            "  {:<16} {:>3} keyframe(s){}{}",
            thread.name,
            thread.len(),
            if thread.visible { "" } else { " [hidden]" },
            if thread.locked { " [locked]" } else { "" }
        );
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {:#}", e);
    }
    init_logging(&args, &path_config)?;

    info!("Loom {} starting", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);
    info!("Config path: {}", paths::config_file(SETTINGS_FILE, &path_config).display());

    let settings = LoomSettings::load(&path_config);
    let mut project = Project::load_with(&args.project, settings.timeline_defaults())?;

    let mut did_something = false;
    if let Some(frame) = args.inspect {
        if frame < 0.0 {
            warn!("Negative inspect frame {}, nothing to show", frame);
        }
        inspect(&project.timeline, frame)?;
        did_something = true;
    }
    if args.play {
        play(&mut project.timeline, args.ticks)?;
        did_something = true;
    }
    if let Some(format) = args.format {
        run_export(&args, &project, &settings, format.into())?;
        did_something = true;
    }
    if !did_something {
        print_summary(&project);
    }
    Ok(())
}

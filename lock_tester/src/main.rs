mod frames;
mod logging;
mod png_surface;

use anyhow::{Context, Result};
use clap::Parser;
use frames::DirectorySource;
use futures::StreamExt;
use png_surface::PngSurface;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use waldo_lock::core_modules::backends::replay::{Recording, ReplayCapability};
use waldo_lock::{PersonPipeline, PipelineConfig, spawn_session};

/// Plays a directory of frames through the person lock engine and writes the
/// annotated frames out as PNGs.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory of input frames, processed in file name order.
    frames_dir: PathBuf,
    /// Directory the annotated frames are written to.
    output_dir: PathBuf,
    /// Recorded model outputs (JSON). Without it nobody is ever detected.
    #[arg(long)]
    detections: Option<PathBuf>,
    /// Pipeline configuration (JSON). The view defaults to the frame size.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Capture rate the frames are played back at.
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
    /// Overrides the motion threshold in pixels.
    #[arg(long)]
    threshold: Option<f64>,
}

fn main() -> Result<()> {
    logging::init_logging();
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get().clamp(1, 4))
        .enable_all()
        .build()
        .context("building runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    // --- 1. Frame Source & Configuration ---
    let source = DirectorySource::open(&args.frames_dir)?;
    let (frame_width, frame_height) = source.probe_dimensions()?;

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig {
            view_width: f64::from(frame_width),
            view_height: f64::from(frame_height),
            ..PipelineConfig::default()
        },
    };
    if let Some(threshold) = args.threshold {
        config.motion_threshold_px = threshold;
    }
    config.validate()?;
    if (config.view_width, config.view_height) != (f64::from(frame_width), f64::from(frame_height)) {
        warn!(
            view_width = config.view_width,
            view_height = config.view_height,
            frame_width,
            frame_height,
            "view size differs from frame size; overlays are drawn in view coordinates"
        );
    }

    // --- 2. Capability & Render Surface ---
    let recording = match &args.detections {
        Some(path) => Recording::from_json_file(path)
            .with_context(|| format!("loading detections {}", path.display()))?,
        None => {
            warn!("no detections recording given; the session will keep seeking");
            Recording::default()
        }
    };
    let capability = ReplayCapability::new(recording, config.tracker.clone());

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let surface = PngSurface::new(args.output_dir.clone(), config.stroke_width);

    // --- 3. Session ---
    let pipeline = PersonPipeline::new(&config, capability, surface);
    let (sender, mut handle) = spawn_session(pipeline);
    info!(frames = source.len(), fps = args.fps, "starting playback");

    // --- 4. Capture Thread ---
    let frame_interval = Duration::from_secs_f64(1.0 / args.fps.max(0.1));
    let capture = std::thread::spawn(move || {
        for frame in source {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    error!("{e:#}");
                    continue;
                }
            };
            if sender.submit(frame).is_err() {
                warn!("session closed, stopping capture");
                break;
            }
            std::thread::sleep(frame_interval);
        }
    });

    // --- 5. Report Loop ---
    {
        let mut reports = std::pin::pin!(handle.reports());
        while let Some(report) = reports.next().await {
            info!(
                frame_id = report.frame_id,
                transition = ?report.transition,
                mode = ?report.mode,
                moving = report.is_moving,
                latency_ms = report.latency.as_secs_f64() * 1000.0,
                "frame"
            );
        }
    }

    if capture.join().is_err() {
        error!("capture thread panicked");
    }
    let (pipeline, summary) = handle.join().await?;
    info!(
        submitted = summary.frames_submitted,
        processed = summary.stats.frames_processed,
        dropped = summary.frames_dropped,
        acquisitions = summary.stats.acquisitions,
        losses = summary.stats.losses,
        written = pipeline.surface().frames_written,
        "playback complete, output saved to {}",
        args.output_dir.display()
    );
    Ok(())
}

//! CLI for replaying landmark recordings through the try-on pipeline.
//!
//! Usage:
//!   glasses-tryon session.json                  # Human-readable output
//!   glasses-tryon session.json --json           # JSON output
//!   glasses-tryon --frames 240 --render-dir out # Synthetic session, PNG frames
//!   glasses-tryon --write-config tryon.json     # Save the default config

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use glasses_tryon::recording::{BlankCamera, RecordedDetector, Recording};
use glasses_tryon::render::FrameCompositor;
use glasses_tryon::{
    telemetry, Config, Error, FrameSize, FrameSource, OverlayPose, OverlayTransform, PoseCell,
    RenderLoop, Result, Tracker, TrackingWorker,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "glasses-tryon")]
#[command(author, version, about = "Replay face landmarks through the glasses overlay alignment", long_about = None)]
struct Args {
    /// Landmark recording (JSON). A synthetic session is generated when omitted.
    recording: Option<PathBuf>,

    /// Number of frames in the synthetic session
    #[arg(long, default_value = "180")]
    frames: usize,

    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    /// Override the overlay scale factor
    #[arg(long)]
    scale_factor: Option<f32>,

    /// Enable exponential pose smoothing with this factor (0, 1]
    #[arg(long)]
    smoothing: Option<f32>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write one PNG per frame with the overlay drawn into this directory
    #[arg(long)]
    render_dir: Option<PathBuf>,

    /// Background image for rendered frames (must match the frame size)
    #[arg(long, requires = "render_dir")]
    background: Option<PathBuf>,

    /// Mark the eye midpoint in rendered frames
    #[arg(long)]
    anchor: bool,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Output {
    source: String,
    frame: FrameSize,
    scale_factor: f32,
    smoothing: Option<f32>,
    frames_total: usize,
    frames_tracked: usize,
    frames_lost: usize,
    frames_failed: usize,
    frames: Vec<FrameOutput>,
}

#[derive(Serialize)]
struct FrameOutput {
    sequence: u64,
    /// Pixel-space pose, absent when no face was found
    pose: Option<OverlayPose>,
    /// What the renderer was told to do
    overlay: OverlayTransform,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    if let Err(e) = telemetry::init_tracing(filter) {
        eprintln!("Warning: {}", e);
    }

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;

    if let Some(ref path) = args.write_config {
        config.save(path)?;
        tracing::info!(path = %path.display(), "configuration written");
        return Ok(());
    }

    let (recording, source) = match args.recording {
        Some(ref path) => (Recording::load(path)?, path.display().to_string()),
        None => (
            Recording::synthetic(args.frames, config.frame),
            format!("synthetic ({} frames)", args.frames),
        ),
    };
    if recording.frame != config.frame {
        return Err(Error::FrameSizeMismatch {
            expected: config.frame,
            actual: recording.frame,
        });
    }
    tracing::info!(frames = recording.len(), source = %source, "replaying landmarks");

    let mut camera = BlankCamera::new(config.frame).with_limit(recording.len() as u64);
    if let Some(ref path) = args.background {
        camera = camera.with_background(image::open(path)?.to_rgba8())?;
    }
    let mut compositor = args.render_dir.as_ref().map(|_| {
        FrameCompositor::new(config.viewport()).with_anchor(args.anchor)
    });
    if let Some(ref dir) = args.render_dir {
        std::fs::create_dir_all(dir)?;
    }

    let cell = Arc::new(PoseCell::new());
    let detector = RecordedDetector::new(Arc::new(recording));
    let tracker = Tracker::new(detector, &config).with_cell(Arc::clone(&cell));
    let worker = TrackingWorker::spawn(tracker)?;
    let mut render_loop = RenderLoop::new(Arc::clone(&cell), &config);

    let mut frames = Vec::new();
    while let Some(frame) = camera.next_frame() {
        let background = frame.image.clone();
        worker.submit(frame)?;
        let outcome = worker.recv_outcome()?;

        let (pose, error) = match outcome.result {
            Ok(pose) => (pose, None),
            Err(e) => (cell.latest(), Some(e.to_string())),
        };

        let overlay = match compositor.as_mut() {
            Some(compositor) => {
                compositor.set_background(background);
                let tick = render_loop.drive(&mut *compositor);
                if let Some(ref dir) = args.render_dir {
                    save_frame(dir, outcome.sequence, compositor)?;
                }
                tick.transform
            }
            None => render_loop.tick().transform,
        };

        frames.push(FrameOutput {
            sequence: outcome.sequence,
            pose,
            overlay,
            error,
        });
    }

    let frames_tracked = frames.iter().filter(|f| f.error.is_none() && f.pose.is_some()).count();
    let frames_failed = frames.iter().filter(|f| f.error.is_some()).count();
    let output = Output {
        source,
        frame: config.frame,
        scale_factor: config.overlay.scale_factor,
        smoothing: config.overlay.smoothing,
        frames_total: frames.len(),
        frames_tracked,
        frames_lost: frames.len() - frames_tracked - frames_failed,
        frames_failed,
        frames,
    };

    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        tracing::info!(path = %path.display(), "output written");
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(scale_factor) = args.scale_factor {
        config.overlay.scale_factor = scale_factor;
    }
    if args.smoothing.is_some() {
        config.overlay.smoothing = args.smoothing;
    }
    config.validate()?;
    Ok(config)
}

fn save_frame(dir: &Path, sequence: u64, compositor: &FrameCompositor) -> Result<()> {
    let path = dir.join(format!("frame_{:05}.png", sequence));
    compositor.canvas().save(&path)?;
    tracing::debug!(path = %path.display(), "frame rendered");
    Ok(())
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!("Source: {} ({})\n", output.source, output.frame));
    s.push_str(&format!("Scale factor: {}\n", output.scale_factor));
    if let Some(alpha) = output.smoothing {
        s.push_str(&format!("Smoothing: {}\n", alpha));
    }
    s.push_str(&format!(
        "Frames: {} (tracked {}, no face {}, failed {})\n",
        output.frames_total, output.frames_tracked, output.frames_lost, output.frames_failed
    ));

    if output.frames.is_empty() {
        s.push_str("\nNo frames replayed.\n");
        return s;
    }

    s.push_str(&format!(
        "\n{:>6}  {:>8} {:>8} {:>8}  {:>8} {:>8} {:>8}\n",
        "frame", "x", "y", "width", "scene x", "scene y", "scale"
    ));
    for frame in &output.frames {
        s.push_str(&format!("{:>6}  ", frame.sequence));
        if let Some(ref error) = frame.error {
            s.push_str(&format!("error: {}\n", error));
            continue;
        }
        match (frame.pose, frame.overlay.placement()) {
            (Some(pose), Some(placement)) => s.push_str(&format!(
                "{:>8.1} {:>8.1} {:>8.1}  {:>8.1} {:>8.1} {:>8.1}\n",
                pose.x,
                pose.y,
                pose.width,
                placement.position.x,
                placement.position.y,
                placement.scale
            )),
            _ => s.push_str("no face (overlay hidden)\n"),
        }
    }

    s
}

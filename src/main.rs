//! Replay a recorded trace of per-frame signals through a capture session.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use pose_capture::{
    capture_flow::{CaptureFlow, FrameSignals},
    config::{Config, EXAMPLE_CONFIG},
    encoding::JpegEncoder,
    pose_estimation::PoseAngles,
    quality::{QualityIssue, QualityVerdict},
    upload::DirectoryUploader,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Trace of per-frame signals to replay (YAML format)
    #[arg(short, long)]
    trace: Option<PathBuf>,

    /// Session identifier used to name the archive
    #[arg(short, long)]
    session_id: Option<String>,

    /// Run a second pass without the accessory
    #[arg(short, long)]
    accessory: bool,

    /// Enable auto-capture
    #[arg(long)]
    auto: bool,

    /// Orientation profile (standard, basic)
    #[arg(short, long)]
    profile: Option<String>,

    /// Write captured photos beneath this directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

/// User action recorded alongside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TraceAction {
    Capture,
    ConfirmPhase,
    CancelRetake,
}

#[derive(Debug, Deserialize)]
struct TraceFrame {
    /// Milliseconds since the start of the trace
    at_ms: u64,
    #[serde(default = "one")]
    faces: usize,
    #[serde(default)]
    pose: Option<PoseAngles>,
    #[serde(default)]
    issues: Vec<QualityIssue>,
    #[serde(default)]
    action: Option<TraceAction>,
    /// Photo index to retake
    #[serde(default)]
    retake: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct Trace {
    frames: Vec<TraceFrame>,
}

fn one() -> usize {
    1
}

impl TraceFrame {
    fn signals(&self) -> FrameSignals {
        let mut issues = self.issues.clone();
        match self.faces {
            0 if !issues.contains(&QualityIssue::NoFace) => issues.insert(0, QualityIssue::NoFace),
            n if n > 1 && !issues.contains(&QualityIssue::MultipleFaces) => {
                issues.insert(0, QualityIssue::MultipleFaces);
            }
            _ => {}
        }
        FrameSignals {
            pose: if self.faces == 1 { self.pose } else { None },
            verdict: QualityVerdict::from_issues(self.faces, issues),
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!("Failed to load config file: {e}. Using defaults.");
                    Config::default()
                }
            }
        }
        None => Config::default(),
    };

    if let Some(session_id) = &args.session_id {
        config.session.session_id.clone_from(session_id);
    }
    if args.accessory {
        config.session.has_accessory_phase = true;
    }
    if args.auto {
        config.timing.auto_capture = true;
    }
    if let Some(profile) = &args.profile {
        config.orientation.profile.clone_from(profile);
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    let Some(trace_path) = &args.trace else {
        bail!("A trace file is required (use --trace, or --print-config for a sample configuration)");
    };
    let config = load_config(&args)?;

    let content = std::fs::read_to_string(trace_path)
        .with_context(|| format!("Failed to read trace {}", trace_path.display()))?;
    let trace: Trace = serde_yaml::from_str(&content).context("Failed to parse trace")?;
    info!("Replaying {} frames from {}", trace.frames.len(), trace_path.display());

    // Replays carry no pixels; photos are encoded from a blank white frame.
    let frame = image::RgbImage::from_pixel(640, 480, image::Rgb([255, 255, 255]));

    let mut flow = CaptureFlow::new(&config, JpegEncoder::from_config(&config.capture))?;
    let base = Instant::now();
    flow.start(base)?;

    let mut last_state = flow.state(base);
    for entry in &trace.frames {
        let now = base + Duration::from_millis(entry.at_ms);

        if let Some(index) = entry.retake {
            if let Err(e) = flow.retake(index) {
                warn!("[{:>6}ms] retake {index} rejected: {e}", entry.at_ms);
            }
        }

        let report = flow.apply_signals(now, entry.signals(), Some(&frame))?;
        if let Some(receipt) = &report.captured {
            info!("[{:>6}ms] auto-captured {}", entry.at_ms, receipt.label);
        }

        match entry.action {
            Some(TraceAction::Capture) => match flow.capture_now(now, &frame) {
                Ok(receipt) => info!("[{:>6}ms] captured {}", entry.at_ms, receipt.label),
                Err(e) => warn!("[{:>6}ms] {e}", entry.at_ms),
            },
            Some(TraceAction::ConfirmPhase) => {
                if let Err(e) = flow.confirm_phase_switch() {
                    warn!("[{:>6}ms] {e}", entry.at_ms);
                }
            }
            Some(TraceAction::CancelRetake) => {
                flow.cancel_retake()?;
            }
            None => {}
        }

        let state = flow.state(now);
        if state != last_state {
            info!("[{:>6}ms] {last_state} -> {state}", entry.at_ms);
            if let Some(prompt) = flow.prompt() {
                info!("[{:>6}ms] {prompt}", entry.at_ms);
            }
            last_state = state;
        }
    }

    println!("Session '{}': {}", flow.session_id(), last_state);
    for (i, photo) in flow.photos().iter().enumerate() {
        println!("  {:>2}. {:<32} {:>9} {:>8} bytes", i + 1, photo.label, photo.phase, photo.image.len());
    }

    flow.stop();

    if let Some(output) = &args.output {
        let mut uploader = DirectoryUploader::new(output);
        let receipt = flow.upload(&mut uploader, &mut |p| info!("Upload {:>3}%: {}", p.percent, p.message))?;
        println!("Wrote {} photos for {}", receipt.entries.len(), receipt.archive_name);
        if let Some(location) = &receipt.location {
            println!("Archive: {}", location.display());
        }
    }

    Ok(())
}

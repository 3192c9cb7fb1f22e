use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tracker_core::{
    config::{parse_roi, RunConfig, DEFAULT_OUTPUT},
    pipeline::{execute, FrameOutcome},
    tracking::{BoundingBox, TrackerKind, TrackerState},
    video::VideoSource,
};

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "person-tracker",
    version,
    about = "Follow one person through a video with OpenCV's single-object trackers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a person picked on the first frame and save an annotated video.
    Track {
        /// Input video path, or a camera index
        #[arg(long, default_value = "0")]
        video: String,

        /// Output video path
        #[arg(long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,

        /// Tracker algorithm: CSRT, KCF, MOSSE or MedianFlow (unknown names use CSRT)
        #[arg(long, default_value = "CSRT")]
        tracker: String,

        /// Initial box as x,y,width,height instead of drawing it
        #[arg(long, value_parser = parse_roi)]
        roi: Option<BoundingBox>,

        /// Do not open any window (requires --roi)
        #[arg(long, requires = "roi")]
        headless: bool,
    },

    /// Track with the built-in source, output and tracker.
    Preset,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    // Respect RUST_LOG; default to info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Track {
            video,
            output,
            tracker,
            roi,
            headless,
        } => RunConfig {
            source: VideoSource::parse(&video),
            output,
            tracker: TrackerKind::from_name(&tracker),
            roi,
            display: !headless,
        },
        Commands::Preset => RunConfig::preset(),
    };

    cmd_track(&config)
}

fn cmd_track(config: &RunConfig) -> Result<()> {
    info!("person tracking");
    info!("  source  : {}", config.source);
    info!("  output  : {}", config.output.display());
    info!("  tracker : {}", config.tracker);

    let pb = spinner("Tracking…");
    let pb2 = pb.clone();

    let result = execute(config, move |outcome: &FrameOutcome| {
        pb2.tick();
        if outcome.index % 15 == 0 {
            pb2.set_message(status_line(outcome));
        }
    })
    .with_context(|| format!("tracking {} failed", config.source));

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            report_failure(&pb, &e);
            return Err(e);
        }
    };

    let verdict = match summary.lost_at {
        Some(frame) => format!("target lost at frame {frame}"),
        None => "target held to the end".to_string(),
    };
    pb.finish_with_message(format!(
        "Done: {} frames written to {}, {verdict}.",
        summary.frames_written,
        config.output.display()
    ));
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn status_line(outcome: &FrameOutcome) -> String {
    let state = match outcome.state {
        TrackerState::Tracking(_) => "tracking",
        TrackerState::Lost => "lost",
        TrackerState::Uninitialized => "waiting",
    };
    format!("frame {} | {state} | {:.1} fps", outcome.index, outcome.fps)
}

fn report_failure(pb: &ProgressBar, e: &anyhow::Error) {
    error!("{e:#}");
    pb.abandon_with_message(format!("Failed: {}", e.root_cause()));
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use opencv::core::Mat;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::display::{
    Control, FixedRoi, FramePresenter, Headless, InteractiveRoi, PreviewWindow, RoiSelector,
};
use crate::error::TrackError;
use crate::rendering::{FpsCounter, FrameRenderer};
use crate::tracking::{create_tracker, TrackSession, TrackerApi, TrackerState, VisualTracker};
use crate::video::{CaptureSource, FrameSink, FrameSource, StreamInfo, VideoFileSink};

const PROFILE_INTERVAL: u64 = 300;

/// What happened to one frame of the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameOutcome {
    /// 0-based index among frames after the ROI frame.
    pub index: u64,
    pub state: TrackerState,
    pub fps: f64,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunSummary {
    /// Frames read from the source, including the one used for ROI selection.
    pub frames_read: u64,
    pub frames_written: u64,
    pub frames_tracked: u64,
    pub lost_at: Option<u64>,
    pub stopped_by_user: bool,
    pub average_fps: f64,
}

// ── Analyzer ──────────────────────────────────────────────────────────────────

pub struct Analyzer<T: VisualTracker> {
    session: TrackSession<T>,
    prof_frames: u64,
    prof_update: Duration,
}

impl<T: VisualTracker> Analyzer<T> {
    pub fn new(session: TrackSession<T>) -> Self {
        Self {
            session,
            prof_frames: 0,
            prof_update: Duration::ZERO,
        }
    }

    pub fn analyze(&mut self, frame: &Mat) -> TrackerState {
        let update_start = Instant::now();
        let state = self.session.advance(frame);
        self.prof_update += update_start.elapsed();

        self.prof_frames += 1;
        if self.prof_frames % PROFILE_INTERVAL == 0 {
            info!(
                frames = self.prof_frames,
                update_ms_per_frame = format!(
                    "{:.2}",
                    self.prof_update.as_secs_f64() * 1000.0 / self.prof_frames as f64
                ),
                "pipeline tracker timings"
            );
        }

        state
    }

    pub fn lost_at(&self) -> Option<u64> {
        self.session.lost_at()
    }
}

// ── Renderer ──────────────────────────────────────────────────────────────────

pub struct Renderer {
    renderer: FrameRenderer,
    fps: FpsCounter,
    prof_frames: u64,
    prof_render: Duration,
}

impl Renderer {
    pub fn new(renderer: FrameRenderer) -> Self {
        Self {
            renderer,
            fps: FpsCounter::start(),
            prof_frames: 0,
            prof_render: Duration::ZERO,
        }
    }

    /// Restart the FPS clock; called when the loop begins.
    pub fn reset_clock(&mut self) {
        self.fps = FpsCounter::start();
    }

    /// Draw the overlay and return the FPS value that was drawn.
    pub fn render(&mut self, frame: &mut Mat, state: TrackerState) -> Result<f64> {
        let fps = self.fps.tick();

        let render_start = Instant::now();
        self.renderer
            .render(frame, state, fps)
            .with_context(|| format!("failed to draw overlay ({state:?})"))?;
        self.prof_render += render_start.elapsed();
        self.prof_frames += 1;

        if self.prof_frames % PROFILE_INTERVAL == 0 {
            info!(
                frames = self.prof_frames,
                render_ms_per_frame = format!(
                    "{:.2}",
                    self.prof_render.as_secs_f64() * 1000.0 / self.prof_frames as f64
                ),
                "pipeline render timings"
            );
        }

        Ok(fps)
    }

    pub fn average_fps(&self) -> f64 {
        self.fps.fps()
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// A seeded run: the first frame has been consumed for ROI selection and the
/// tracker initialised on it.
pub struct Pipeline<T: VisualTracker> {
    analyzer: Analyzer<T>,
    renderer: Renderer,
    stream: StreamInfo,
}

impl<T: VisualTracker> Pipeline<T> {
    /// Read the first frame, ask `selector` for the box and seed `tracker`.
    pub fn start<S, R>(source: &mut S, selector: &mut R, tracker: T) -> Result<Self>
    where
        S: FrameSource + ?Sized,
        R: RoiSelector + ?Sized,
    {
        let first = source
            .next_frame()?
            .ok_or_else(|| TrackError::EmptySource(source.name()))?;
        let stream = StreamInfo::from_frame(&first, source.fps());

        let roi = selector.select(&first)?;
        let mut session = TrackSession::new(tracker);
        session.start(&first, roi)?;

        Ok(Self {
            analyzer: Analyzer::new(session),
            renderer: Renderer::new(FrameRenderer::new()),
            stream,
        })
    }

    /// Size and rate the output should be opened with.
    pub fn stream(&self) -> StreamInfo {
        self.stream
    }

    /// Track, render, write and present every remaining frame.
    ///
    /// Stops at end of stream or when the presenter asks to.  `on_frame` is
    /// called after each frame has been written.
    pub fn run<S, K, P, F>(
        mut self,
        source: &mut S,
        sink: &mut K,
        presenter: &mut P,
        mut on_frame: F,
    ) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
        P: FramePresenter + ?Sized,
        F: FnMut(&FrameOutcome),
    {
        let mut summary = RunSummary {
            frames_read: 1,
            ..RunSummary::default()
        };
        self.renderer.reset_clock();

        while let Some(mut frame) = source.next_frame()? {
            let index = summary.frames_read - 1;
            summary.frames_read += 1;

            let state = self.analyzer.analyze(&frame);
            if matches!(state, TrackerState::Tracking(_)) {
                summary.frames_tracked += 1;
            }

            let fps = self.renderer.render(&mut frame, state)?;
            sink.write(&frame)?;
            summary.frames_written += 1;

            on_frame(&FrameOutcome { index, state, fps });

            if presenter.present(&frame)? == Control::Stop {
                info!(frame = index, "stopped by user");
                summary.stopped_by_user = true;
                break;
            }
        }

        sink.finish()?;
        summary.lost_at = self.analyzer.lost_at();
        summary.average_fps = self.renderer.average_fps();
        Ok(summary)
    }
}

/// Run `config` end to end against the real camera/file, writer and window.
pub fn execute<F>(config: &RunConfig, on_frame: F) -> Result<RunSummary>
where
    F: FnMut(&FrameOutcome),
{
    let mut source = CaptureSource::open(&config.source)?;

    let api = TrackerApi::detect()?;
    let tracker = create_tracker(config.tracker, api)?;

    let mut selector: Box<dyn RoiSelector> = match config.roi {
        Some(roi) => Box::new(FixedRoi(roi)),
        None if config.display => Box::new(InteractiveRoi),
        None => {
            warn!("no display and no --roi given; nothing to track");
            return Err(TrackError::RoiCancelled.into());
        }
    };

    let pipeline = Pipeline::start(&mut source, selector.as_mut(), tracker)?;
    let stream = pipeline.stream();

    let mut sink = VideoFileSink::create(&config.output, stream)
        .with_context(|| format!("cannot write {}", config.output.display()))?;

    let mut presenter: Box<dyn FramePresenter> = if config.display {
        Box::new(PreviewWindow::open()?)
    } else {
        Box::new(Headless)
    };

    info!(
        source = %config.source,
        output = %config.output.display(),
        tracker = %config.tracker,
        expected_frames = ?source.frame_count(),
        "tracking started"
    );
    let summary = pipeline.run(&mut source, &mut sink, presenter.as_mut(), on_frame)?;
    info!(
        frames_written = summary.frames_written,
        frames_tracked = summary.frames_tracked,
        lost_at = ?summary.lost_at,
        stopped_by_user = summary.stopped_by_user,
        average_fps = format!("{:.1}", summary.average_fps),
        "tracking finished"
    );
    Ok(summary)
}

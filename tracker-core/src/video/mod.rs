//! video — OpenCV capture and writer bridge
//!
//! Frames come in through a [`FrameSource`] and leave through a [`FrameSink`].
//! The loop only sees the traits, so tests can drive it with in-memory frames
//! while the binary uses `VideoCapture` and an `mp4v` `VideoWriter`.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use tracing::{debug, info, warn};

use crate::error::TrackError;

/// Codec tag for the output container.
pub const OUTPUT_FOURCC: [char; 4] = ['m', 'p', '4', 'v'];
/// Frame rate assumed when the source does not report one (most webcams).
pub const FALLBACK_FPS: f64 = 30.0;

// ── Source description ───────────────────────────────────────────────────────

/// Where frames come from: a camera index or a file path / stream URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Device(i32),
    File(PathBuf),
}

impl VideoSource {
    /// A purely numeric argument names a camera, anything else a file.
    pub fn parse(s: &str) -> Self {
        match s.trim().parse::<i32>() {
            Ok(index) if index >= 0 => VideoSource::Device(index),
            _ => VideoSource::File(PathBuf::from(s)),
        }
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::Device(index) => write!(f, "camera {index}"),
            VideoSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Resolution and frame rate the output must match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: i32,
    pub height: i32,
    pub fps: f64,
}

impl StreamInfo {
    /// Describe a stream by one of its frames plus the source's frame rate.
    pub fn from_frame(frame: &Mat, fps: f64) -> Self {
        Self {
            width: frame.cols(),
            height: frame.rows(),
            fps: if fps.is_finite() && fps > 0.0 {
                fps
            } else {
                FALLBACK_FPS
            },
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

// ── Traits ───────────────────────────────────────────────────────────────────

/// A sequence of frames.  `Ok(None)` is the normal end of stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Mat>>;

    /// Native frame rate, or 0 when unknown.
    fn fps(&self) -> f64;

    /// Human-readable name for diagnostics.
    fn name(&self) -> String {
        "video source".to_string()
    }
}

/// Receives every rendered frame in order.
pub trait FrameSink {
    fn write(&mut self, frame: &Mat) -> Result<()>;

    /// Flush and close.  Writing after this is an error.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

// ── OpenCV capture ───────────────────────────────────────────────────────────

pub struct CaptureSource {
    capture: VideoCapture,
    source: VideoSource,
    fps: f64,
}

impl CaptureSource {
    pub fn open(source: &VideoSource) -> Result<Self> {
        let capture = match source {
            VideoSource::Device(index) => VideoCapture::new(*index, videoio::CAP_ANY),
            VideoSource::File(path) => {
                VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
            }
        }
        .with_context(|| format!("failed to create capture for {source}"))?;

        if !capture.is_opened()? {
            return Err(TrackError::SourceOpen(source.to_string()).into());
        }

        let fps = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
        info!(%source, width, height, fps, "opened video source");

        Ok(Self {
            capture,
            source: source.clone(),
            fps,
        })
    }

    /// Approximate number of frames, when the container records it.
    pub fn frame_count(&self) -> Option<u64> {
        let count = self.capture.get(videoio::CAP_PROP_FRAME_COUNT).ok()?;
        (count >= 1.0).then_some(count as u64)
    }
}

impl FrameSource for CaptureSource {
    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        let grabbed = self
            .capture
            .read(&mut frame)
            .with_context(|| format!("failed to read frame from {}", self.source))?;
        if !grabbed || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn name(&self) -> String {
        self.source.to_string()
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("failed to release capture: {e}");
        }
    }
}

// ── OpenCV writer ────────────────────────────────────────────────────────────

pub struct VideoFileSink {
    writer: VideoWriter,
    path: PathBuf,
    written: u64,
    finished: bool,
}

impl VideoFileSink {
    /// Open `path` for `mp4v` output at the stream's size and rate.
    pub fn create<P: AsRef<Path>>(path: P, info: StreamInfo) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let [a, b, c, d] = OUTPUT_FOURCC;
        let fourcc = VideoWriter::fourcc(a, b, c, d)?;
        let writer = VideoWriter::new(
            &path.to_string_lossy(),
            fourcc,
            info.fps,
            info.size(),
            true,
        )
        .with_context(|| format!("failed to create writer for {}", path.display()))?;

        if !writer.is_opened()? {
            return Err(TrackError::SinkOpen(path.display().to_string()).into());
        }
        info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            "opened output video"
        );

        Ok(Self {
            writer,
            path,
            written: 0,
            finished: false,
        })
    }
}

impl FrameSink for VideoFileSink {
    fn write(&mut self, frame: &Mat) -> Result<()> {
        self.writer
            .write(frame)
            .with_context(|| format!("failed to write frame to {}", self.path.display()))?;
        self.written += 1;
        if self.written % 100 == 0 {
            debug!(written = self.written, "frames written");
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer
            .release()
            .with_context(|| format!("failed to finalise {}", self.path.display()))?;
        info!(path = %self.path.display(), frames = self.written, "output video closed");
        Ok(())
    }
}

impl Drop for VideoFileSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("{e:#}");
        }
    }
}

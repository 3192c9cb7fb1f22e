//! tracking — single-target state machine on top of an external tracker
//!
//! The correlation-filter trackers live in OpenCV; this module only decides
//! when to call them.  A session starts `Uninitialized`, becomes `Tracking`
//! once the tracker accepts the user's box, and drops to `Lost` the first time
//! an update fails.  `Lost` is terminal: the tracker is never consulted again
//! for the rest of the run.

use anyhow::Result;
#[cfg(test)]
use mockall::automock;
use opencv::core::{Mat, Rect, Rect2d};
use tracing::{debug, warn};

use crate::error::TrackError;

mod factory;
mod opencv_tracker;

pub use factory::{create_tracker, TrackerApi, TrackerBinding, TrackerKind};
pub use opencv_tracker::OpenCvTracker;

// ── BoundingBox ───────────────────────────────────────────────────────────────

/// Axis-aligned box in integer pixel coordinates, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A box with no area cannot be tracked.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

impl From<Rect> for BoundingBox {
    fn from(rect: Rect) -> Self {
        Self::new(rect.x, rect.y, rect.width, rect.height)
    }
}

impl From<BoundingBox> for Rect {
    fn from(bbox: BoundingBox) -> Self {
        Rect::new(bbox.x, bbox.y, bbox.width, bbox.height)
    }
}

// Legacy trackers report sub-pixel boxes; round to the nearest pixel.
impl From<Rect2d> for BoundingBox {
    fn from(rect: Rect2d) -> Self {
        Self::new(
            rect.x.round() as i32,
            rect.y.round() as i32,
            rect.width.round() as i32,
            rect.height.round() as i32,
        )
    }
}

impl From<BoundingBox> for Rect2d {
    fn from(bbox: BoundingBox) -> Self {
        Rect2d::new(
            bbox.x as f64,
            bbox.y as f64,
            bbox.width as f64,
            bbox.height as f64,
        )
    }
}

// ── VisualTracker ─────────────────────────────────────────────────────────────

/// A single-object tracker: seeded once with a box, then asked for the new box
/// on every following frame.
#[cfg_attr(test, automock)]
pub trait VisualTracker {
    /// Seed the tracker with the target's location in `frame`.
    fn init(&mut self, frame: &Mat, roi: BoundingBox) -> Result<()>;

    /// Locate the target in `frame`.  `Ok(None)` means the tracker lost it.
    fn update(&mut self, frame: &Mat) -> Result<Option<BoundingBox>>;
}

impl<T: VisualTracker + ?Sized> VisualTracker for Box<T> {
    fn init(&mut self, frame: &Mat, roi: BoundingBox) -> Result<()> {
        (**self).init(frame, roi)
    }

    fn update(&mut self, frame: &Mat) -> Result<Option<BoundingBox>> {
        (**self).update(frame)
    }
}

// ── TrackerState ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    #[default]
    Uninitialized,
    Tracking(BoundingBox),
    Lost,
}

impl TrackerState {
    pub fn bbox(&self) -> Option<BoundingBox> {
        match self {
            TrackerState::Tracking(bbox) => Some(*bbox),
            _ => None,
        }
    }
}

// ── TrackSession ──────────────────────────────────────────────────────────────

/// Owns a tracker and enforces the Uninitialized → Tracking → Lost lifecycle.
pub struct TrackSession<T: VisualTracker> {
    tracker: T,
    state: TrackerState,
    /// Frames passed to `advance` so far.
    frames: u64,
    /// Index (0-based, among advanced frames) of the first failed update.
    lost_at: Option<u64>,
}

impl<T: VisualTracker> TrackSession<T> {
    pub fn new(tracker: T) -> Self {
        Self {
            tracker,
            state: TrackerState::Uninitialized,
            frames: 0,
            lost_at: None,
        }
    }

    /// Seed the tracker with the user's box on the first frame.
    pub fn start(&mut self, frame: &Mat, roi: BoundingBox) -> Result<()> {
        if !roi.is_valid() {
            return Err(TrackError::RoiCancelled.into());
        }
        self.tracker.init(frame, roi)?;
        self.state = TrackerState::Tracking(roi);
        debug!(?roi, "tracker initialised");
        Ok(())
    }

    /// Run one frame through the tracker and return the resulting state.
    ///
    /// Once the session is `Lost` (or was never started) the tracker is left
    /// alone and the state is returned unchanged.
    pub fn advance(&mut self, frame: &Mat) -> TrackerState {
        let index = self.frames;
        self.frames += 1;

        if !matches!(self.state, TrackerState::Tracking(_)) {
            return self.state;
        }

        self.state = match self.tracker.update(frame) {
            Ok(Some(bbox)) if bbox.is_valid() => TrackerState::Tracking(bbox),
            Ok(Some(bbox)) => {
                warn!(frame = index, ?bbox, "tracker returned an empty box");
                TrackerState::Lost
            }
            Ok(None) => TrackerState::Lost,
            Err(e) => {
                warn!(frame = index, "tracker update error: {e:#}");
                TrackerState::Lost
            }
        };

        if self.state == TrackerState::Lost {
            self.lost_at = Some(index);
            warn!(frame = index, "target lost; tracking disabled for the rest of the run");
        }
        self.state
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn lost_at(&self) -> Option<u64> {
        self.lost_at
    }
}

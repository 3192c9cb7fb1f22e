//! display — HighGUI windows: ROI picking and the live preview

use anyhow::{Context, Result};
use opencv::{core::Mat, highgui};
use tracing::{debug, info, warn};

use crate::{error::TrackError, tracking::BoundingBox};

/// Key that ends the run early from the preview window.
pub const QUIT_KEY: char = 'q';
pub const PREVIEW_WINDOW: &str = "Tracking";
pub const SELECT_WINDOW: &str = "Select person";

/// What the loop should do after a frame has been shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

/// Decide the box to track on the first frame.
pub trait RoiSelector {
    fn select(&mut self, frame: &Mat) -> Result<BoundingBox>;
}

/// Shows each rendered frame and reports whether the user asked to stop.
pub trait FramePresenter {
    fn present(&mut self, frame: &Mat) -> Result<Control>;
}

// ── ROI selection ─────────────────────────────────────────────────────────────

/// A box known ahead of time (`--roi`), for headless runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedRoi(pub BoundingBox);

impl RoiSelector for FixedRoi {
    fn select(&mut self, _frame: &Mat) -> Result<BoundingBox> {
        if !self.0.is_valid() {
            return Err(TrackError::RoiCancelled.into());
        }
        Ok(self.0)
    }
}

/// OpenCV's modal `selectROI` window.  Enter or Space confirms, Esc or `c`
/// cancels (an empty rectangle).
#[derive(Debug, Default)]
pub struct InteractiveRoi;

impl RoiSelector for InteractiveRoi {
    fn select(&mut self, frame: &Mat) -> Result<BoundingBox> {
        info!("draw a box around the person, then press ENTER (ESC cancels)");
        let rect = highgui::select_roi_def(SELECT_WINDOW, frame)
            .context("ROI selection window failed")?;
        if let Err(e) = highgui::destroy_window(SELECT_WINDOW) {
            debug!("could not close selection window: {e}");
        }

        let roi = BoundingBox::from(rect);
        if !roi.is_valid() {
            return Err(TrackError::RoiCancelled.into());
        }
        info!(?roi, "region of interest selected");
        Ok(roi)
    }
}

// ── Preview ───────────────────────────────────────────────────────────────────

/// Live preview window, closed again on drop.
pub struct PreviewWindow {
    name: &'static str,
}

impl PreviewWindow {
    pub fn open() -> Result<Self> {
        highgui::named_window(PREVIEW_WINDOW, highgui::WINDOW_AUTOSIZE)
            .context("failed to open preview window")?;
        Ok(Self {
            name: PREVIEW_WINDOW,
        })
    }
}

impl FramePresenter for PreviewWindow {
    fn present(&mut self, frame: &Mat) -> Result<Control> {
        highgui::imshow(self.name, frame)?;
        let key = highgui::wait_key(1)?;
        Ok(control_for_key(key))
    }
}

impl Drop for PreviewWindow {
    fn drop(&mut self) {
        if let Err(e) = highgui::destroy_window(self.name) {
            warn!("failed to close preview window: {e}");
        }
    }
}

/// Presenter for runs without a display.
#[derive(Debug, Default)]
pub struct Headless;

impl FramePresenter for Headless {
    fn present(&mut self, _frame: &Mat) -> Result<Control> {
        Ok(Control::Continue)
    }
}

/// Map a `wait_key` result to a loop decision.  `-1` means no key.
pub fn control_for_key(key: i32) -> Control {
    if key >= 0 && (key & 0xff) == QUIT_KEY as i32 {
        Control::Stop
    } else {
        Control::Continue
    }
}

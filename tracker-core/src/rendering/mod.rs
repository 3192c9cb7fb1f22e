//! rendering — draw the tracking overlay onto a frame
//!
//! While tracking: a translucent fill over the box interior, a solid border on
//! top of it and a label above.  After loss: a fixed failure message.  On every
//! frame: the processing FPS in the top-left corner.

use std::time::Instant;

use anyhow::{Context, Result};
use opencv::{
    core::{self, Mat, Point, Rect, Scalar},
    imgproc,
    prelude::*,
};

use crate::tracking::{BoundingBox, TrackerState};

/// Opacity of the fill drawn over the tracked box.
pub const FILL_ALPHA: f64 = 0.2;
pub const BORDER_THICKNESS: i32 = 2;
pub const LABEL: &str = "Person";
pub const FAILURE_MESSAGE: &str = "Tracking failure detected";

/// Baseline-left corners of the fixed text lines.
pub const FPS_ORIGIN: (i32, i32) = (20, 30);
pub const FAILURE_ORIGIN: (i32, i32) = (20, 60);

const FONT: i32 = imgproc::FONT_HERSHEY_SIMPLEX;
const FONT_SCALE: f64 = 0.6;
const TEXT_THICKNESS: i32 = 2;

// BGR
pub fn box_color() -> Scalar {
    Scalar::new(0.0, 255.0, 0.0, 0.0)
}
pub fn failure_color() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}
pub fn fps_color() -> Scalar {
    Scalar::new(0.0, 255.0, 255.0, 0.0)
}

// ── FPS ───────────────────────────────────────────────────────────────────────

/// Processing throughput since the loop started: frames / wall-clock seconds.
#[derive(Debug, Clone, Copy)]
pub struct FpsCounter {
    start: Instant,
    frames: u64,
}

impl FpsCounter {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            frames: 0,
        }
    }

    /// Count one processed frame and return the updated rate.
    pub fn tick(&mut self) -> f64 {
        self.frames += 1;
        self.fps()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn fps(&self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.frames as f64 / elapsed
        } else {
            0.0
        }
    }
}

// ── FrameRenderer ─────────────────────────────────────────────────────────────

/// Reusable rendering context; keeps the blend buffers between frames.
#[derive(Default)]
pub struct FrameRenderer {
    overlay: Mat,
    blended: Mat,
}

impl FrameRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw the overlay for `state` plus the FPS readout into `frame`.
    pub fn render(&mut self, frame: &mut Mat, state: TrackerState, fps: f64) -> Result<()> {
        match state {
            TrackerState::Tracking(bbox) => self.draw_tracked(frame, bbox)?,
            TrackerState::Lost => draw_failure(frame)?,
            TrackerState::Uninitialized => {}
        }
        draw_fps(frame, fps)
    }

    fn draw_tracked(&mut self, frame: &mut Mat, bbox: BoundingBox) -> Result<()> {
        let rect = Rect::from(bbox);

        // Fill on a copy, then blend the copy back: pixels outside the box are
        // identical in both inputs and come through unchanged.
        frame
            .copy_to(&mut self.overlay)
            .context("failed to copy frame for overlay")?;
        imgproc::rectangle(
            &mut self.overlay,
            rect,
            box_color(),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;
        core::add_weighted(
            &self.overlay,
            FILL_ALPHA,
            &*frame,
            1.0 - FILL_ALPHA,
            0.0,
            &mut self.blended,
            -1,
        )
        .context("failed to blend box fill")?;
        std::mem::swap(frame, &mut self.blended);

        imgproc::rectangle(
            frame,
            rect,
            box_color(),
            BORDER_THICKNESS,
            imgproc::LINE_8,
            0,
        )?;

        let (label_x, label_y) = label_origin(bbox);
        let origin = Point::new(label_x, label_y);
        imgproc::put_text(
            frame,
            LABEL,
            origin,
            FONT,
            FONT_SCALE,
            box_color(),
            TEXT_THICKNESS,
            imgproc::LINE_8,
            false,
        )?;
        Ok(())
    }
}

fn draw_failure(frame: &mut Mat) -> Result<()> {
    imgproc::put_text(
        frame,
        FAILURE_MESSAGE,
        Point::new(FAILURE_ORIGIN.0, FAILURE_ORIGIN.1),
        FONT,
        FONT_SCALE,
        failure_color(),
        TEXT_THICKNESS,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

fn draw_fps(frame: &mut Mat, fps: f64) -> Result<()> {
    imgproc::put_text(
        frame,
        &format_fps(fps),
        Point::new(FPS_ORIGIN.0, FPS_ORIGIN.1),
        FONT,
        FONT_SCALE,
        fps_color(),
        TEXT_THICKNESS,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}

/// Just above the box, pushed down when the box touches the top edge.
fn label_origin(bbox: BoundingBox) -> (i32, i32) {
    (bbox.x, bbox.y.saturating_sub(10).max(15))
}

pub fn format_fps(fps: f64) -> String {
    format!("FPS: {:.1}", fps.max(0.0))
}

#[cfg(test)]
mod tests {
    use opencv::core::{Vec3b, CV_8UC3};

    use super::*;

    fn blank() -> Mat {
        Mat::new_rows_cols_with_default(240, 320, CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn pixel(frame: &Mat, x: i32, y: i32) -> [u8; 3] {
        let px = frame.at_2d::<Vec3b>(y, x).unwrap();
        [px[0], px[1], px[2]]
    }

    fn count_color(frame: &Mat, bgr: [u8; 3]) -> usize {
        let mut n = 0;
        for y in 0..frame.rows() {
            for x in 0..frame.cols() {
                if pixel(frame, x, y) == bgr {
                    n += 1;
                }
            }
        }
        n
    }

    #[test]
    fn tracked_box_has_border_and_translucent_fill() {
        let bbox = BoundingBox::new(100, 80, 60, 90);
        let mut frame = blank();
        FrameRenderer::new()
            .render(&mut frame, TrackerState::Tracking(bbox), 12.0)
            .unwrap();

        let mid_y = bbox.y + bbox.height / 2;
        let mid_x = bbox.x + bbox.width / 2;
        assert_eq!(pixel(&frame, bbox.x, mid_y), [0, 255, 0]);
        assert_eq!(pixel(&frame, bbox.right() - 1, mid_y), [0, 255, 0]);
        assert_eq!(pixel(&frame, mid_x, bbox.y), [0, 255, 0]);
        assert_eq!(pixel(&frame, mid_x, bbox.bottom() - 1), [0, 255, 0]);

        // 0.2 * 255 over black
        assert_eq!(pixel(&frame, mid_x, mid_y), [0, 51, 0]);
        // outside the box the frame is untouched
        assert_eq!(pixel(&frame, 300, 220), [0, 0, 0]);
    }

    #[test]
    fn lost_frame_has_message_and_no_box() {
        let mut frame = blank();
        FrameRenderer::new()
            .render(&mut frame, TrackerState::Lost, 3.0)
            .unwrap();

        assert!(count_color(&frame, [0, 0, 255]) > 0);
        assert_eq!(count_color(&frame, [0, 255, 0]), 0);
        assert_eq!(count_color(&frame, [0, 51, 0]), 0);
    }

    #[test]
    fn fps_is_always_drawn() {
        for state in [
            TrackerState::Uninitialized,
            TrackerState::Lost,
            TrackerState::Tracking(BoundingBox::new(150, 100, 40, 40)),
        ] {
            let mut frame = blank();
            FrameRenderer::new().render(&mut frame, state, 0.0).unwrap();
            assert!(count_color(&frame, [0, 255, 255]) > 0, "{state:?}");
        }
    }

    #[test]
    fn label_sits_above_box_and_stays_on_screen() {
        assert_eq!(label_origin(BoundingBox::new(40, 100, 10, 10)), (40, 90));
        assert_eq!(label_origin(BoundingBox::new(40, 3, 10, 10)), (40, 15));
        assert_eq!(label_origin(BoundingBox::new(7, i32::MIN, 10, 10)), (7, 15));
    }

    #[test]
    fn fps_text_is_never_negative() {
        assert_eq!(format_fps(29.97), "FPS: 30.0");
        assert_eq!(format_fps(0.0), "FPS: 0.0");
        assert_eq!(format_fps(-4.0), "FPS: 0.0");
    }

    #[test]
    fn fps_counter_counts_frames() {
        let mut counter = FpsCounter::start();
        assert_eq!(counter.frames(), 0);
        assert!(counter.fps() >= 0.0);
        for _ in 0..5 {
            assert!(counter.tick() >= 0.0);
        }
        assert_eq!(counter.frames(), 5);
    }
}

//! config — the immutable description of one tracking run

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::{
    tracking::{BoundingBox, TrackerKind},
    video::VideoSource,
};

/// Output path used when none is given.
pub const DEFAULT_OUTPUT: &str = "output.mp4";

/// Literals behind the `preset` run: no runtime configurability.
pub const PRESET_SOURCE: &str = "video.mp4";
pub const PRESET_OUTPUT: &str = "tracked_output.mp4";
pub const PRESET_TRACKER: TrackerKind = TrackerKind::Csrt;

/// Everything a run needs, fixed before the first frame is read.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub source: VideoSource,
    pub output: PathBuf,
    pub tracker: TrackerKind,
    /// Skip interactive selection and seed the tracker with this box.
    pub roi: Option<BoundingBox>,
    /// Mirror frames to a preview window and listen for the quit key.
    pub display: bool,
}

impl RunConfig {
    pub fn preset() -> Self {
        Self {
            source: VideoSource::parse(PRESET_SOURCE),
            output: PathBuf::from(PRESET_OUTPUT),
            tracker: PRESET_TRACKER,
            roi: None,
            display: true,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source: VideoSource::Device(0),
            output: PathBuf::from(DEFAULT_OUTPUT),
            tracker: TrackerKind::default(),
            roi: None,
            display: true,
        }
    }
}

/// Parse `x,y,w,h` into a box.
pub fn parse_roi(s: &str) -> Result<BoundingBox> {
    let parts = s
        .split(',')
        .map(|p| {
            p.trim()
                .parse::<i32>()
                .with_context(|| format!("invalid ROI component {p:?}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let [x, y, width, height] = parts[..] else {
        bail!("ROI must be x,y,width,height; got {s:?}");
    };
    let bbox = BoundingBox::new(x, y, width, height);
    if !bbox.is_valid() {
        bail!("ROI must have positive width and height; got {s:?}");
    }
    Ok(bbox)
}

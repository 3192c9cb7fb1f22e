use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Ptr, Rect, Rect2d},
    prelude::*,
    tracking::{
        legacy_Tracker, legacy_TrackerCSRT, legacy_TrackerKCF, legacy_TrackerMOSSE,
        legacy_TrackerMedianFlow, TrackerCSRT, TrackerKCF, TrackerKCF_Params,
    },
    video::Tracker,
};

use super::{BoundingBox, TrackerBinding, TrackerKind, VisualTracker};
use crate::error::TrackError;

enum Handle {
    Modern(Ptr<Tracker>),
    Legacy(Ptr<legacy_Tracker>),
}

/// One of OpenCV's single-object trackers behind the [`VisualTracker`] seam.
pub struct OpenCvTracker {
    kind: TrackerKind,
    handle: Handle,
}

impl OpenCvTracker {
    pub fn create(kind: TrackerKind, binding: TrackerBinding) -> Result<Self> {
        let handle = match binding {
            TrackerBinding::Csrt => Handle::Modern(TrackerCSRT::create_def()?.into()),
            TrackerBinding::Kcf => {
                let params = TrackerKCF_Params::default()?;
                Handle::Modern(TrackerKCF::create(params)?.into())
            }
            TrackerBinding::LegacyCsrt => Handle::Legacy(legacy_TrackerCSRT::create_def()?.into()),
            TrackerBinding::LegacyKcf => Handle::Legacy(legacy_TrackerKCF::create_def()?.into()),
            TrackerBinding::LegacyMosse => Handle::Legacy(legacy_TrackerMOSSE::create()?.into()),
            TrackerBinding::LegacyMedianFlow => {
                Handle::Legacy(legacy_TrackerMedianFlow::create_def()?.into())
            }
        };
        Ok(Self { kind, handle })
    }
}

impl VisualTracker for OpenCvTracker {
    fn init(&mut self, frame: &Mat, roi: BoundingBox) -> Result<()> {
        match &mut self.handle {
            Handle::Modern(tracker) => tracker
                .init(frame, Rect::from(roi))
                .with_context(|| format!("{} init failed", self.kind))?,
            Handle::Legacy(tracker) => {
                let accepted = tracker
                    .init(frame, Rect2d::from(roi))
                    .with_context(|| format!("{} init failed", self.kind))?;
                if !accepted {
                    return Err(TrackError::TrackerInit(self.kind.to_string()).into());
                }
            }
        }
        Ok(())
    }

    fn update(&mut self, frame: &Mat) -> Result<Option<BoundingBox>> {
        let found = match &mut self.handle {
            Handle::Modern(tracker) => {
                let mut rect = Rect::default();
                tracker
                    .update(frame, &mut rect)?
                    .then(|| BoundingBox::from(rect))
            }
            Handle::Legacy(tracker) => {
                let mut rect = Rect2d::default();
                tracker
                    .update(frame, &mut rect)?
                    .then(|| BoundingBox::from(rect))
            }
        };
        Ok(found)
    }
}

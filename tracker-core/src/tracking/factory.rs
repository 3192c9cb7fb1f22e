use std::fmt;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{OpenCvTracker, VisualTracker};

/// The OpenCV tracking algorithms a run can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerKind {
    #[default]
    Csrt,
    Kcf,
    Mosse,
    MedianFlow,
}

impl TrackerKind {
    pub const ALL: [TrackerKind; 4] = [
        TrackerKind::Csrt,
        TrackerKind::Kcf,
        TrackerKind::Mosse,
        TrackerKind::MedianFlow,
    ];

    /// Resolve a user-supplied name.  Unknown names fall back to CSRT.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_else(|| {
                warn!(requested = name, "unknown tracker; falling back to CSRT");
                TrackerKind::Csrt
            })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackerKind::Csrt => "CSRT",
            TrackerKind::Kcf => "KCF",
            TrackerKind::Mosse => "MOSSE",
            TrackerKind::MedianFlow => "MedianFlow",
        }
    }

    /// Pick the concrete OpenCV constructor for this kind under `api`.
    pub fn binding(self, api: TrackerApi) -> TrackerBinding {
        match (api, self) {
            (TrackerApi::Modern, TrackerKind::Csrt) => TrackerBinding::Csrt,
            (TrackerApi::Modern, TrackerKind::Kcf) => TrackerBinding::Kcf,
            (TrackerApi::Legacy, TrackerKind::Csrt) => TrackerBinding::LegacyCsrt,
            (TrackerApi::Legacy, TrackerKind::Kcf) => TrackerBinding::LegacyKcf,
            // The bindings only expose these two through the legacy namespace.
            (_, TrackerKind::Mosse) => TrackerBinding::LegacyMosse,
            (_, TrackerKind::MedianFlow) => TrackerBinding::LegacyMedianFlow,
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the linked OpenCV keeps its tracker constructors.
///
/// OpenCV 4.5 moved the older tracker family into `cv::legacy`, leaving
/// only CSRT and KCF (with a new interface) in the main tracking module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerApi {
    Modern,
    Legacy,
}

impl TrackerApi {
    pub fn for_version(major: i32, minor: i32) -> Self {
        if (major, minor) >= (4, 5) {
            TrackerApi::Legacy
        } else {
            TrackerApi::Modern
        }
    }

    /// Inspect the OpenCV library this binary is linked against.
    pub fn detect() -> Result<Self> {
        let major = opencv::core::get_version_major().context("failed to query OpenCV version")?;
        let minor = opencv::core::get_version_minor().context("failed to query OpenCV version")?;
        let api = Self::for_version(major, minor);
        info!(major, minor, ?api, "resolved OpenCV tracker API");
        Ok(api)
    }
}

/// A concrete OpenCV tracker constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerBinding {
    Csrt,
    Kcf,
    LegacyCsrt,
    LegacyKcf,
    LegacyMosse,
    LegacyMedianFlow,
}

/// Build the tracker for `kind`, ready to be seeded with a box.
pub fn create_tracker(kind: TrackerKind, api: TrackerApi) -> Result<Box<dyn VisualTracker>> {
    let binding = kind.binding(api);
    let tracker = OpenCvTracker::create(kind, binding)
        .with_context(|| format!("failed to create {kind} tracker ({binding:?})"))?;
    Ok(Box::new(tracker))
}

use thiserror::Error;

/// Failures that end a run before or outside the per-frame loop.
///
/// Losing the target is not one of them: it is a state transition shown on the
/// frame, and processing continues to the end of the stream.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("could not open video source {0}")]
    SourceOpen(String),
    #[error("could not read the first frame from {0}")]
    EmptySource(String),
    #[error("region of interest selection was cancelled")]
    RoiCancelled,
    #[error("could not open output video {0}")]
    SinkOpen(String),
    #[error("{0} tracker rejected the initial bounding box")]
    TrackerInit(String),
}

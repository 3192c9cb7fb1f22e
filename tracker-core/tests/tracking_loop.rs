use anyhow::Result;
use mockall::{mock, Sequence};
use opencv::{
    core::{Mat, Scalar, Vec3b, CV_8UC3},
    prelude::*,
};
use std::path::PathBuf;

use tracker_core::{
    config::RunConfig,
    display::{FixedRoi, Headless},
    error::TrackError,
    pipeline::{execute, FrameOutcome, Pipeline},
    tracking::{BoundingBox, TrackerApi, TrackerBinding, TrackerKind, TrackerState, VisualTracker},
    video::{CaptureSource, FrameSink, FrameSource, VideoSource},
};

mock! {
    Tracker {}

    impl VisualTracker for Tracker {
        fn init(&mut self, frame: &Mat, roi: BoundingBox) -> Result<()>;
        fn update(&mut self, frame: &Mat) -> Result<Option<BoundingBox>>;
    }
}

const BOX: BoundingBox = BoundingBox::new(120, 60, 50, 100);

/// `n` black 320x240 frames at 30 fps.
struct Clip {
    remaining: usize,
}

impl FrameSource for Clip {
    fn next_frame(&mut self) -> Result<Option<Mat>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(Mat::new_rows_cols_with_default(
            240,
            320,
            CV_8UC3,
            Scalar::all(0.0),
        )?))
    }

    fn fps(&self) -> f64 {
        30.0
    }
}

#[derive(Default)]
struct Recorder {
    frames: Vec<Mat>,
    finished: bool,
}

impl FrameSink for Recorder {
    fn write(&mut self, frame: &Mat) -> Result<()> {
        self.frames.push(frame.try_clone()?);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

fn pixel(frame: &Mat, x: i32, y: i32) -> [u8; 3] {
    let px = frame.at_2d::<Vec3b>(y, x).unwrap();
    [px[0], px[1], px[2]]
}

fn has_color(frame: &Mat, bgr: [u8; 3]) -> bool {
    (0..frame.rows()).any(|y| (0..frame.cols()).any(|x| pixel(frame, x, y) == bgr))
}

fn has_border_at(frame: &Mat, bbox: BoundingBox) -> bool {
    let green = [0, 255, 0];
    let mid_x = bbox.x + bbox.width / 2;
    let mid_y = bbox.y + bbox.height / 2;
    pixel(frame, bbox.x, mid_y) == green
        && pixel(frame, bbox.right() - 1, mid_y) == green
        && pixel(frame, mid_x, bbox.y) == green
        && pixel(frame, mid_x, bbox.bottom() - 1) == green
}

fn always_tracking() -> MockTracker {
    let mut tracker = MockTracker::new();
    tracker
        .expect_init()
        .withf(|_, roi| *roi == BOX)
        .times(1)
        .returning(|_, _| Ok(()));
    tracker.expect_update().returning(|_| Ok(Some(BOX)));
    tracker
}

#[test]
fn fixed_box_is_drawn_on_every_frame() {
    let mut source = Clip { remaining: 12 };
    let pipeline = Pipeline::start(&mut source, &mut FixedRoi(BOX), always_tracking()).unwrap();

    let mut sink = Recorder::default();
    let mut outcomes: Vec<FrameOutcome> = Vec::new();
    let summary = pipeline
        .run(&mut source, &mut sink, &mut Headless, |o| outcomes.push(*o))
        .unwrap();

    assert_eq!(sink.frames.len(), 11);
    for frame in &sink.frames {
        assert!(has_border_at(frame, BOX));
        // FPS readout
        assert!(has_color(frame, [0, 255, 255]));
        // no failure message
        assert!(!has_color(frame, [0, 0, 255]));
    }
    for outcome in &outcomes {
        assert_eq!(outcome.state, TrackerState::Tracking(BOX));
        assert!(outcome.fps >= 0.0 && outcome.fps.is_finite());
    }
    assert_eq!(summary.frames_tracked, 11);
    assert_eq!(summary.lost_at, None);
    assert!(sink.finished);
}

#[test]
fn loss_at_frame_k_is_permanent() {
    const K: usize = 4;
    let mut seq = Sequence::new();
    let mut tracker = MockTracker::new();
    tracker.expect_init().returning(|_, _| Ok(()));
    tracker
        .expect_update()
        .times(K)
        .in_sequence(&mut seq)
        .returning(|_| Ok(Some(BOX)));
    // The failing update is the last call the tracker ever sees.
    tracker
        .expect_update()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(None));

    let mut source = Clip { remaining: 15 };
    let pipeline = Pipeline::start(&mut source, &mut FixedRoi(BOX), tracker).unwrap();
    let mut sink = Recorder::default();
    let summary = pipeline
        .run(&mut source, &mut sink, &mut Headless, |_| {})
        .unwrap();

    assert_eq!(sink.frames.len(), 14);
    for (index, frame) in sink.frames.iter().enumerate() {
        if index < K {
            assert!(has_border_at(frame, BOX), "frame {index}");
            assert!(!has_color(frame, [0, 0, 255]), "frame {index}");
        } else {
            assert!(has_color(frame, [0, 0, 255]), "frame {index}");
            assert!(!has_color(frame, [0, 255, 0]), "frame {index}");
        }
    }
    assert_eq!(summary.lost_at, Some(K as u64));
    assert_eq!(summary.frames_tracked, K as u64);
}

#[test]
fn thirty_frames_in_twenty_nine_out() {
    let mut source = Clip { remaining: 30 };
    let pipeline = Pipeline::start(&mut source, &mut FixedRoi(BOX), always_tracking()).unwrap();
    assert_eq!(pipeline.stream().fps, 30.0);

    let mut sink = Recorder::default();
    let summary = pipeline
        .run(&mut source, &mut sink, &mut Headless, |_| {})
        .unwrap();

    assert_eq!(sink.frames.len(), 29);
    assert_eq!(summary.frames_read, 30);
    assert_eq!(summary.frames_written, 29);
    assert!(!summary.stopped_by_user);
}

#[test]
fn empty_source_fails_before_anything_is_written() {
    let mut tracker = MockTracker::new();
    tracker.expect_init().never();
    tracker.expect_update().never();

    let mut source = Clip { remaining: 0 };
    let err = Pipeline::start(&mut source, &mut FixedRoi(BOX), tracker)
        .err()
        .expect("no first frame");
    assert!(matches!(
        err.downcast_ref::<TrackError>(),
        Some(TrackError::EmptySource(_))
    ));
}

#[test]
fn unopenable_source_reports_a_diagnostic() {
    let source = VideoSource::parse("/no/such/dir/missing.mp4");
    let err = CaptureSource::open(&source).err().expect("open must fail");
    assert!(err.to_string().contains("missing.mp4"));
    assert!(matches!(
        err.downcast_ref::<TrackError>(),
        Some(TrackError::SourceOpen(_))
    ));
}

#[test]
fn unopenable_source_writes_no_output() {
    let output = std::env::temp_dir().join(format!(
        "person-tracker-{}-never-written.mp4",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&output);

    let config = RunConfig {
        source: VideoSource::File(PathBuf::from("/no/such/dir/missing.mp4")),
        output: output.clone(),
        roi: Some(BOX),
        display: false,
        ..RunConfig::default()
    };
    let mut frames_seen = 0;
    let err = execute(&config, |_| frames_seen += 1)
        .err()
        .expect("run must fail");

    assert!(matches!(
        err.downcast_ref::<TrackError>(),
        Some(TrackError::SourceOpen(_))
    ));
    assert_eq!(frames_seen, 0);
    assert!(!output.exists());
}

#[test]
fn unknown_tracker_name_means_csrt() {
    let kind = TrackerKind::from_name("GOTURN");
    assert_eq!(kind, TrackerKind::Csrt);
    assert_eq!(kind.binding(TrackerApi::Legacy), TrackerBinding::LegacyCsrt);
    assert_eq!(kind.binding(TrackerApi::Modern), TrackerBinding::Csrt);
}

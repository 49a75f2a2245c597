mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::init_logger;
use common::synthetic_image::{disks_gray, solid_gray};
use golf_ball_detector::detect::{
    CascadeOutcome, Detection, DetectionMethod, DetectionPipeline, Detector, DetectorError,
    HoughCircleDetector, LazyDetector, PixelGrid, RunCondition, Stage, StageStatus,
};

fn grid(img: image::GrayImage) -> PixelGrid {
    PixelGrid::from_gray(img).expect("grid")
}

fn status(outcome: &CascadeOutcome, method: DetectionMethod) -> StageStatus {
    outcome
        .stages
        .iter()
        .find(|s| s.method == method)
        .map(|s| s.status.clone())
        .expect("stage report")
}

#[test]
fn two_circles_skip_the_fallback_stages() {
    init_logger();
    let img = disks_gray(300, 160, &[(70.0, 80.0, 18.0), (220.0, 80.0, 22.0)], 240, 40);
    let outcome = DetectionPipeline::default().run_cascade(&grid(img));

    assert_eq!(status(&outcome, DetectionMethod::HoughCircle), StageStatus::Ran { found: 2 });
    assert_eq!(status(&outcome, DetectionMethod::Blob), StageStatus::Skipped);
    assert_eq!(status(&outcome, DetectionMethod::Contour), StageStatus::Skipped);
    assert_eq!(outcome.detections.len(), 2);
    assert!(
        outcome
            .detections
            .iter()
            .all(|d| d.method() == DetectionMethod::HoughCircle)
    );
}

#[test]
fn single_circle_runs_blob_but_not_contour() {
    init_logger();
    let img = disks_gray(400, 400, &[(200.0, 150.0, 20.0)], 255, 128);
    let outcome = DetectionPipeline::default().run_cascade(&grid(img));

    assert!(outcome.ran(DetectionMethod::HoughCircle));
    assert!(outcome.ran(DetectionMethod::Blob));
    assert!(!outcome.ran(DetectionMethod::Contour));
    // the blob at the same spot is an overlap and gets dropped
    assert_eq!(status(&outcome, DetectionMethod::Blob), StageStatus::Ran { found: 0 });
}

#[test]
fn empty_frame_reaches_the_contour_stage() {
    let outcome = DetectionPipeline::default().run_cascade(&grid(solid_gray(200, 200, 90)));
    assert!(outcome.ran(DetectionMethod::HoughCircle));
    assert!(outcome.ran(DetectionMethod::Blob));
    assert!(outcome.ran(DetectionMethod::Contour));
    assert!(outcome.detections.is_empty());
}

struct Counting {
    method: DetectionMethod,
    calls: Arc<AtomicUsize>,
    results: Vec<Detection>,
}

impl Detector for Counting {
    fn method(&self) -> DetectionMethod {
        self.method
    }

    fn detect(
        &self,
        _grid: &PixelGrid,
        _prior: &[Detection],
    ) -> Result<Vec<Detection>, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.results.clone())
    }
}

#[test]
fn lazily_built_stage_is_constructed_once_and_only_when_reached() {
    let builds = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));

    let lazy = {
        let builds = Arc::clone(&builds);
        let calls = Arc::clone(&calls);
        LazyDetector::new(DetectionMethod::Contour, move || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Counting {
                method: DetectionMethod::Contour,
                calls: Arc::clone(&calls),
                results: vec![Detection::circle(DetectionMethod::Contour, (5.0, 5.0), 3.0, 0.9)],
            })
        })
    };
    let lazy = Arc::new(lazy);

    let pipeline = DetectionPipeline::with_stages(
        vec![
            Stage::new(Arc::new(HoughCircleDetector::default()), RunCondition::Always),
            Stage::new(lazy.clone(), RunCondition::FewerThan(1)),
        ],
        3,
    );

    // a frame with two circles never reaches the fallback
    let busy = disks_gray(300, 160, &[(70.0, 80.0, 18.0), (220.0, 80.0, 22.0)], 240, 40);
    pipeline.detect_grid(&grid(busy));
    assert!(!lazy.is_initialized());
    assert_eq!(builds.load(Ordering::SeqCst), 0);

    let empty = grid(solid_gray(64, 64, 100));
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let found = pipeline.detect_grid(&empty);
                assert_eq!(found.len(), 1);
                assert_eq!(found[0].method(), DetectionMethod::Contour);
            });
        }
    });
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

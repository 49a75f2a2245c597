mod common;

use common::init_logger;
use common::synthetic_image::{Disk, disks_gray};
use golf_ball_detector::detect::{
    BlobDetector, ContourDetector, Detection, DetectionMethod, DetectionPipeline,
    HoughCircleDetector, PixelGrid,
};
use image::GrayImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random scene: a few disks of random brightness on a noisy background.
fn random_scene(rng: &mut StdRng) -> GrayImage {
    let w = rng.gen_range(80..160u32);
    let h = rng.gen_range(80..160u32);
    let count = rng.gen_range(0..4usize);
    let disks: Vec<Disk> = (0..count)
        .map(|_| {
            (
                rng.gen_range(0.0..w as f32),
                rng.gen_range(0.0..h as f32),
                rng.gen_range(4.0..30.0f32),
            )
        })
        .collect();
    let fg = rng.gen_range(0..=255u8);
    let bg = rng.gen_range(0..=255u8);
    let mut img = disks_gray(w, h, &disks, fg, bg);
    let noise = rng.gen_range(0..12i16);
    if noise > 0 {
        for px in img.pixels_mut() {
            let v = px[0] as i16 + rng.gen_range(-noise..=noise);
            px[0] = v.clamp(0, 255) as u8;
        }
    }
    img
}

fn ceiling(method: DetectionMethod) -> f32 {
    match method {
        DetectionMethod::HoughCircle => 0.9,
        DetectionMethod::Blob => 0.8,
        DetectionMethod::Contour => 0.7,
    }
}

fn assert_within_ceiling(detections: &[Detection]) {
    for d in detections {
        assert!(
            d.confidence() >= 0.0 && d.confidence() <= ceiling(d.method()) + 1e-6,
            "{} confidence {} above ceiling",
            d.method(),
            d.confidence()
        );
    }
}

#[test]
fn confidences_respect_per_method_ceilings() {
    init_logger();
    let mut rng = StdRng::seed_from_u64(7);
    let hough = HoughCircleDetector::default();
    let blob = BlobDetector::default();
    let contour = ContourDetector::default();
    let pipeline = DetectionPipeline::default();

    for _ in 0..12 {
        let grid = PixelGrid::from_gray(random_scene(&mut rng)).expect("grid");
        assert_within_ceiling(&hough.detect_circles(&grid));
        assert_within_ceiling(&blob.detect_blobs(&grid, &[]).expect("blob"));
        assert_within_ceiling(&contour.detect_contours(&grid).expect("contour"));
        assert_within_ceiling(&pipeline.detect_grid(&grid));
    }
}

#[test]
fn fused_output_is_short_and_ranked() {
    let mut rng = StdRng::seed_from_u64(11);
    let pipeline = DetectionPipeline::default();

    for _ in 0..12 {
        let grid = PixelGrid::from_gray(random_scene(&mut rng)).expect("grid");
        let detections = pipeline.detect_grid(&grid);
        assert!(detections.len() <= 3, "{detections:?}");
        for pair in detections.windows(2) {
            assert!(pair[0].confidence() >= pair[1].confidence());
        }
    }
}

#[test]
fn overlapping_detections_from_different_stages_never_coexist() {
    let mut rng = StdRng::seed_from_u64(23);
    let pipeline = DetectionPipeline::default();

    for _ in 0..12 {
        let grid = PixelGrid::from_gray(random_scene(&mut rng)).expect("grid");
        let detections = pipeline.detect_grid(&grid);
        for (i, a) in detections.iter().enumerate() {
            for b in &detections[i + 1..] {
                if a.method() == b.method() {
                    continue;
                }
                let limit = 0.8 * a.radius_px().max(b.radius_px());
                assert!(
                    a.center_distance(b) >= limit,
                    "{a:?} overlaps {b:?}"
                );
            }
        }
    }
}

#[test]
fn every_detection_lies_on_its_frame() {
    let mut rng = StdRng::seed_from_u64(5);
    let pipeline = DetectionPipeline::default();

    for _ in 0..8 {
        let grid = PixelGrid::from_gray(random_scene(&mut rng)).expect("grid");
        let (w, h) = (grid.width() as f32, grid.height() as f32);
        for d in pipeline.detect_grid(&grid) {
            let b = d.bbox();
            assert!(b.x1 <= b.x2 && b.y1 <= b.y2);
            assert!(d.radius_px() >= 0.0);
            let (x, y) = d.center();
            assert!((0.0..w).contains(&x) && (0.0..h).contains(&y), "{d:?} outside {w}x{h}");
        }
    }
}

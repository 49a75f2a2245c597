mod common;

use approx::assert_abs_diff_eq;
use common::init_logger;
use common::synthetic_image::{disks_gray, jpeg_bytes, png_bytes, solid_gray};
use golf_ball_detector::detect::{DetectionMethod, DetectionPipeline, PipelineError};
use golf_ball_detector::{DetectionEnvelope, FrameMetadata};

#[test]
fn solid_gray_frame_has_no_golf_balls() {
    init_logger();
    let bytes = png_bytes(&solid_gray(400, 400, 128));
    let detections = DetectionPipeline::default().detect(&bytes);
    assert!(detections.is_empty(), "{detections:?}");
}

#[test]
fn white_disk_is_found_by_the_circle_stage() {
    init_logger();
    let img = disks_gray(400, 400, &[(200.0, 150.0, 20.0)], 255, 128);
    let detections = DetectionPipeline::default().detect(&png_bytes(&img));

    assert_eq!(detections.len(), 1, "{detections:?}");
    let d = &detections[0];
    assert_eq!(d.method(), DetectionMethod::HoughCircle);
    let (x, y) = d.center();
    assert_abs_diff_eq!(x, 200.0, epsilon = 2.0);
    assert_abs_diff_eq!(y, 150.0, epsilon = 2.0);
    assert_abs_diff_eq!(d.radius_px(), 20.0, epsilon = 2.0);
    assert_abs_diff_eq!(d.diameter_px(), 2.0 * d.radius_px(), epsilon = 1e-4);
    assert!(d.confidence() > 0.4, "confidence {}", d.confidence());
}

#[test]
fn one_ball_per_disk_for_small_and_large_radii() {
    init_logger();
    let pipeline = DetectionPipeline::default();
    for (fg, bg) in [(255u8, 0u8), (255, 128)] {
        for r in [12.0f32, 30.0, 45.0, 60.0, 90.0, 110.0] {
            let img = disks_gray(400, 400, &[(200.0, 200.0, r)], fg, bg);
            let detections = pipeline.detect(&png_bytes(&img));

            assert_eq!(detections.len(), 1, "r={r} bg={bg}: {detections:?}");
            let d = &detections[0];
            assert_eq!(d.method(), DetectionMethod::HoughCircle);
            let (x, y) = d.center();
            assert_abs_diff_eq!(x, 200.0, epsilon = 2.0);
            assert_abs_diff_eq!(y, 200.0, epsilon = 2.0);
            assert_abs_diff_eq!(d.radius_px(), r, epsilon = 0.15 * r);
        }
    }
}

#[test]
fn jpeg_frame_is_handled_like_png() {
    init_logger();
    let img = disks_gray(400, 400, &[(200.0, 150.0, 20.0)], 255, 128);
    let detections = DetectionPipeline::default().detect(&jpeg_bytes(&img));

    assert!(!detections.is_empty());
    let (x, y) = detections[0].center();
    assert_abs_diff_eq!(x, 200.0, epsilon = 3.0);
    assert_abs_diff_eq!(y, 150.0, epsilon = 3.0);
}

#[test]
fn corrupted_bytes_yield_no_detections() {
    init_logger();
    let pipeline = DetectionPipeline::default();
    assert!(pipeline.detect(b"\x89PNG\r\n\x1a\nthis is not really a png").is_empty());
    assert!(pipeline.detect(&[]).is_empty());
}

#[test]
fn strict_entry_point_reports_decode_failures() {
    let err = DetectionPipeline::default()
        .try_detect(b"not an image")
        .unwrap_err();
    assert!(matches!(err, PipelineError::Decode(_)), "{err}");
}

#[test]
fn strict_and_lenient_agree_on_valid_input() {
    let img = disks_gray(400, 400, &[(200.0, 150.0, 20.0)], 255, 128);
    let bytes = png_bytes(&img);
    let pipeline = DetectionPipeline::default();
    let strict = pipeline.try_detect(&bytes).expect("strict detect");
    assert_eq!(strict, pipeline.detect(&bytes));
}

#[test]
fn envelope_carries_metadata_and_detections() {
    let img = disks_gray(400, 400, &[(200.0, 150.0, 20.0)], 255, 128);
    let detections = DetectionPipeline::default().detect(&png_bytes(&img));
    let metadata = FrameMetadata {
        timestamp: Some("2024-06-01T12:00:00Z".into()),
        frame_number: Some(17),
        pitch: Some(12.5),
        roll: None,
    };

    let json = serde_json::to_value(DetectionEnvelope::new(metadata, detections)).expect("json");
    assert_eq!(json["frame_number"], 17);
    assert!(json["roll"].is_null());

    let ball = &json["golf_balls"][0];
    assert_eq!(ball["method"], "hough_circle");
    assert_eq!(ball["bbox"].as_array().map(Vec::len), Some(4));
    assert_eq!(ball["center"].as_array().map(Vec::len), Some(2));
    assert!(ball["radius_px"].as_f64().is_some());
    assert!(ball["diameter_px"].as_f64().is_some());
    let confidence = ball["confidence"].as_f64().expect("confidence");
    assert!((0.0..=1.0).contains(&confidence));
}

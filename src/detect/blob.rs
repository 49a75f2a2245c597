//! Multi-threshold blob detector biased towards compact, round, solid regions.
//!
//! The grayscale image is binarised at a ladder of thresholds. Blobs that pass
//! the shape filters at one level are grouped with blobs from other levels
//! lying at the same place; a group seen at enough levels becomes a keypoint.

use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

use super::error::DetectorError;
use super::grid::PixelGrid;
use super::shape::{
    Moments, circularity, convexity, external_contours, is_saturated, perimeter, threshold_mask,
};
use super::types::{Detection, DetectionMethod};

/// Parameters of the blob stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    pub min_threshold: u8,
    /// Exclusive upper end of the threshold ladder.
    pub max_threshold: u8,
    pub threshold_step: u8,
    /// Number of levels a blob must appear at.
    pub min_repeatability: usize,
    pub min_dist_between_blobs: f32,
    /// 255 looks for bright blobs, 0 for dark ones.
    pub blob_color: u8,
    pub min_area: f64,
    /// Exclusive.
    pub max_area: f64,
    pub min_circularity: f64,
    pub min_convexity: f64,
    pub min_inertia_ratio: f64,
    /// A blob closer than `dedup_factor * max(r_blob, r_prior)` to a prior
    /// detection is dropped.
    pub dedup_factor: f32,
    pub response_gain: f32,
    pub max_confidence: f32,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            min_threshold: 50,
            max_threshold: 220,
            threshold_step: 10,
            min_repeatability: 2,
            min_dist_between_blobs: 10.0,
            blob_color: 255,
            min_area: 50.0,
            max_area: 15000.0,
            min_circularity: 0.6,
            min_convexity: 0.7,
            min_inertia_ratio: 0.4,
            dedup_factor: 0.8,
            response_gain: 2.0,
            max_confidence: 0.8,
        }
    }
}

/// A blob that survived grouping across threshold levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobKeypoint {
    pub x: f32,
    pub y: f32,
    /// Diameter in pixels.
    pub size: f32,
    /// Fraction of threshold levels the blob was found at, in `[0, 1]`.
    pub response: f32,
}

#[derive(Debug, Clone, Copy)]
struct LevelBlob {
    x: f64,
    y: f64,
    radius: f64,
}

#[derive(Debug, Clone, Default)]
pub struct BlobDetector {
    config: BlobConfig,
}

impl BlobDetector {
    pub fn new(config: BlobConfig) -> Self {
        Self { config }
    }

    /// Converts keypoints to detections, skipping those that sit on top of a
    /// detection already found by an earlier stage. Keypoints are not
    /// compared with each other.
    pub fn detect_blobs(
        &self,
        grid: &PixelGrid,
        prior: &[Detection],
    ) -> Result<Vec<Detection>, DetectorError> {
        let c = &self.config;
        let keypoints = self.find_blobs(grid.gray())?;
        let mut out = Vec::new();

        for kp in &keypoints {
            let radius = kp.size / 2.0;
            let overlaps = prior.iter().any(|p| {
                let (px, py) = p.center();
                let dist = ((kp.x - px).powi(2) + (kp.y - py).powi(2)).sqrt();
                dist < c.dedup_factor * radius.max(p.radius_px())
            });
            if overlaps {
                continue;
            }
            let confidence = (kp.response * c.response_gain).min(c.max_confidence);
            out.push(Detection::circle(
                DetectionMethod::Blob,
                (kp.x, kp.y),
                radius,
                confidence,
            ));
        }
        debug!(
            "blob: {} keypoints, {} kept after overlap check against {} prior",
            keypoints.len(),
            out.len(),
            prior.len()
        );
        Ok(out)
    }

    pub fn find_blobs(&self, gray: &GrayImage) -> Result<Vec<BlobKeypoint>, DetectorError> {
        let levels = self.levels();
        if levels.is_empty() {
            return Ok(Vec::new());
        }

        let mut groups: Vec<Vec<LevelBlob>> = Vec::new();
        for &t in &levels {
            let current = self.level_blobs(gray, t)?;
            let mut fresh: Vec<Vec<LevelBlob>> = Vec::new();
            for blob in current {
                match self.matching_group(&groups, &blob) {
                    Some(j) => insert_by_radius(&mut groups[j], blob),
                    None => fresh.push(vec![blob]),
                }
            }
            groups.extend(fresh);
        }

        let total = levels.len() as f32;
        let keypoints = groups
            .iter()
            .filter(|g| g.len() >= self.config.min_repeatability)
            .map(|g| {
                let n = g.len() as f64;
                let x = g.iter().map(|b| b.x).sum::<f64>() / n;
                let y = g.iter().map(|b| b.y).sum::<f64>() / n;
                BlobKeypoint {
                    x: x as f32,
                    y: y as f32,
                    size: (g[g.len() / 2].radius * 2.0) as f32,
                    response: g.len() as f32 / total,
                }
            })
            .collect();
        Ok(keypoints)
    }

    fn levels(&self) -> Vec<u8> {
        let c = &self.config;
        let step = c.threshold_step.max(1) as usize;
        (c.min_threshold..c.max_threshold).step_by(step).collect()
    }

    /// Shape-filtered blobs at one threshold level.
    fn level_blobs(
        &self,
        gray: &GrayImage,
        threshold: u8,
    ) -> Result<Vec<LevelBlob>, DetectorError> {
        let c = &self.config;
        let mut mask = threshold_mask(gray, threshold)?;
        if c.blob_color == 0 {
            for px in mask.pixels_mut() {
                px[0] = 255 - px[0];
            }
        }
        if is_saturated(&mask) {
            return Ok(Vec::new());
        }

        let mut blobs = Vec::new();
        for contour in external_contours(&mask) {
            let pts = &contour.points;
            let moments = Moments::of_polygon(pts);
            let area = moments.area();
            if area < c.min_area || area >= c.max_area {
                continue;
            }
            if circularity(area, perimeter(pts)) < c.min_circularity {
                continue;
            }
            if moments.inertia_ratio() < c.min_inertia_ratio {
                continue;
            }
            if convexity(pts, area) < c.min_convexity {
                continue;
            }
            let Some((x, y)) = moments.centroid() else {
                continue;
            };
            // the blob center itself must be foreground
            let (ix, iy) = (x.round() as i64, y.round() as i64);
            if ix < 0 || iy < 0 || ix >= mask.width() as i64 || iy >= mask.height() as i64 {
                continue;
            }
            if mask.get_pixel(ix as u32, iy as u32)[0] == 0 {
                continue;
            }

            let mut dists: Vec<f64> = pts
                .iter()
                .map(|p| ((p.x as f64 - x).powi(2) + (p.y as f64 - y).powi(2)).sqrt())
                .collect();
            dists.sort_by(|a, b| a.total_cmp(b));
            let radius = (dists[(dists.len() - 1) / 2] + dists[dists.len() / 2]) / 2.0;
            blobs.push(LevelBlob { x, y, radius });
        }
        Ok(blobs)
    }

    fn matching_group(&self, groups: &[Vec<LevelBlob>], blob: &LevelBlob) -> Option<usize> {
        let min_dist = self.config.min_dist_between_blobs as f64;
        groups.iter().position(|g| {
            let mid = g[g.len() / 2];
            let dist = ((mid.x - blob.x).powi(2) + (mid.y - blob.y).powi(2)).sqrt();
            dist < min_dist || dist < mid.radius || dist < blob.radius
        })
    }
}

/// Keeps a group sorted by radius so its middle entry is the median blob.
fn insert_by_radius(group: &mut Vec<LevelBlob>, blob: LevelBlob) {
    let pos = group.partition_point(|b| b.radius <= blob.radius);
    group.insert(pos, blob);
}

//! Last-resort detector: blur, Otsu binarisation, and a circularity test on
//! every outer contour.

use image::GrayImage;
use imageproc::contrast::otsu_level;
use imageproc::filter::separable_filter_equal;
use log::debug;
use serde::{Deserialize, Serialize};

use super::error::DetectorError;
use super::grid::PixelGrid;
use super::shape::{
    circularity, external_contours, is_saturated, min_enclosing_circle, perimeter, polygon_area,
    threshold_mask,
};
use super::types::{Detection, DetectionMethod};

/// Parameters of the contour stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Gaussian kernel size (odd).
    pub blur_kernel: usize,
    pub blur_sigma: f32,
    /// Exclusive lower area bound.
    pub min_area: f64,
    /// Exclusive upper area bound.
    pub max_area: f64,
    /// Contours must be strictly rounder than this.
    pub min_circularity: f64,
    pub circularity_gain: f32,
    pub max_confidence: f32,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 9,
            blur_sigma: 2.0,
            min_area: 100.0,
            max_area: 10000.0,
            min_circularity: 0.6,
            circularity_gain: 0.8,
            max_confidence: 0.7,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContourDetector {
    config: ContourConfig,
}

impl ContourDetector {
    pub fn new(config: ContourConfig) -> Self {
        Self { config }
    }

    pub fn detect_contours(&self, grid: &PixelGrid) -> Result<Vec<Detection>, DetectorError> {
        let c = &self.config;
        let blurred = gaussian_blur(grid.gray(), c.blur_kernel, c.blur_sigma);
        let level = otsu_level(&blurred);
        let mask = threshold_mask(&blurred, level)?;
        if is_saturated(&mask) {
            debug!("contour: otsu level {level} leaves no background");
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for contour in external_contours(&mask) {
            let pts = &contour.points;
            let area = polygon_area(pts);
            if area <= c.min_area || area >= c.max_area {
                continue;
            }
            let circ = circularity(area, perimeter(pts));
            if circ <= c.min_circularity {
                continue;
            }
            let Some((x, y, radius)) = min_enclosing_circle(pts) else {
                continue;
            };
            let confidence = (circ as f32 * c.circularity_gain).min(c.max_confidence);
            out.push(Detection::circle(
                DetectionMethod::Contour,
                (x as f32, y as f32),
                radius as f32,
                confidence,
            ));
        }
        debug!("contour: otsu level {level}, {} round contours", out.len());
        Ok(out)
    }
}

/// Separable Gaussian blur with an explicit kernel size.
fn gaussian_blur(gray: &GrayImage, kernel: usize, sigma: f32) -> GrayImage {
    let kernel = gaussian_kernel(kernel, sigma);
    separable_filter_equal(gray, &kernel)
}

fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let size = size.max(1) | 1;
    let half = (size / 2) as f32;
    let sigma = sigma.max(1e-3);
    let mut k: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - half;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = k.iter().sum();
    for v in k.iter_mut() {
        *v /= sum;
    }
    k
}

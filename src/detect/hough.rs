//! Hough-gradient circle search with a brightness/contrast plausibility gate.
//!
//! Every Canny edge pixel votes along its gradient direction, in both senses,
//! at each radius in `[min_radius, max_radius]`. Circle centers show up as
//! peaks in the accumulator because the normals of a circular edge converge.
//! For each peak the radius is read off a histogram of edge distances, and
//! the winning radius must be backed by edge points along a good part of its
//! circumference.

use std::f32::consts::PI;

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use log::debug;
use serde::{Deserialize, Serialize};

use super::grid::PixelGrid;
use super::types::{Detection, DetectionMethod};

const CONTRAST_EPSILON: f32 = 1e-6;

/// Parameters of the Hough stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleConfig {
    /// Minimum distance between accepted circle centers (pixels).
    pub min_dist: f32,
    pub min_radius: u32,
    pub max_radius: u32,
    /// Inverse accumulator resolution; 1.0 votes at full image resolution.
    pub dp: f32,
    /// Upper Canny threshold; the lower one is half of it.
    pub canny_high: f32,
    /// Minimum votes (3x3 neighbourhood) for a center.
    pub accumulator_threshold: f32,
    /// Fraction of the circumference `2πr` that must be covered by edge
    /// points within ±1 px of the chosen radius.
    pub min_arc_fraction: f32,
    /// Upper bound on the accumulator peaks whose radius is measured.
    pub max_candidates: usize,
    /// Smoothing applied before the gradient used for vote directions.
    pub gradient_sigma: f32,
    /// Width of the boundary band sampled for `edge_mean` (pixels).
    pub edge_ring_width: f32,
    pub min_contrast: f32,
    pub min_brightness: f32,
    /// Brightness that is accepted regardless of contrast.
    pub bright_override: f32,
    pub max_confidence: f32,
}

impl Default for CircleConfig {
    fn default() -> Self {
        Self {
            min_dist: 30.0,
            min_radius: 8,
            max_radius: 120,
            dp: 1.0,
            canny_high: 50.0,
            accumulator_threshold: 30.0,
            min_arc_fraction: 0.5,
            max_candidates: 64,
            gradient_sigma: 1.0,
            edge_ring_width: 2.0,
            min_contrast: 1.1,
            min_brightness: 0.4,
            bright_override: 0.7,
            max_confidence: 0.9,
        }
    }
}

/// A raw circle hypothesis before the plausibility gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleCandidate {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Accumulator votes in the 3x3 neighbourhood of the center.
    pub votes: u32,
}

/// Intensity statistics used to accept or reject a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleScore {
    pub inside_mean: f32,
    pub edge_mean: f32,
    pub contrast: f32,
    pub brightness: f32,
}

#[derive(Debug, Clone, Default)]
pub struct HoughCircleDetector {
    config: CircleConfig,
}

impl HoughCircleDetector {
    pub fn new(config: CircleConfig) -> Self {
        Self { config }
    }

    /// Runs the circle search and keeps the candidates that pass the
    /// brightness/contrast gate.
    pub fn detect_circles(&self, grid: &PixelGrid) -> Vec<Detection> {
        let gray = grid.gray();
        let candidates = self.find_circles(gray);
        let detections: Vec<Detection> = candidates
            .iter()
            .filter_map(|c| self.to_detection(gray, c))
            .collect();
        debug!(
            "hough: {} candidates, {} accepted",
            candidates.len(),
            detections.len()
        );
        detections
    }

    /// Accumulator search; candidates come out strongest first.
    pub fn find_circles(&self, gray: &GrayImage) -> Vec<CircleCandidate> {
        let c = &self.config;
        let (w, h) = gray.dimensions();
        if w < 3 || h < 3 || c.max_radius < c.min_radius || c.min_radius == 0 {
            return Vec::new();
        }

        let edges = canny(gray, c.canny_high * 0.5, c.canny_high);
        let smoothed = gaussian_blur_f32(gray, c.gradient_sigma.max(0.1));
        let gx = horizontal_sobel(&smoothed);
        let gy = vertical_sobel(&smoothed);

        let dp = c.dp.max(1.0);
        let aw = ((w as f32) / dp).ceil() as usize;
        let ah = ((h as f32) / dp).ceil() as usize;
        let mut accum = vec![0u32; aw * ah];
        let mut edge_points: Vec<(f32, f32)> = Vec::new();

        for (x, y, px) in edges.enumerate_pixels() {
            if px[0] == 0 {
                continue;
            }
            let gxv = gx.get_pixel(x, y)[0] as f32;
            let gyv = gy.get_pixel(x, y)[0] as f32;
            let mag = (gxv * gxv + gyv * gyv).sqrt();
            if mag < 1e-6 {
                continue;
            }
            let (xf, yf) = (x as f32, y as f32);
            edge_points.push((xf, yf));
            let (dx, dy) = (gxv / mag, gyv / mag);

            for sign in [1.0f32, -1.0] {
                for r in c.min_radius..=c.max_radius {
                    let r = r as f32 * sign;
                    let vx = ((xf + dx * r) / dp).round();
                    let vy = ((yf + dy * r) / dp).round();
                    // a ray that has left the accumulator never comes back
                    if vx < 0.0 || vy < 0.0 || vx >= aw as f32 || vy >= ah as f32 {
                        break;
                    }
                    accum[vy as usize * aw + vx as usize] += 1;
                }
            }
        }
        if edge_points.is_empty() {
            return Vec::new();
        }

        let support = neighbourhood_sum(&accum, aw, ah);
        let peaks = local_maxima(&support, aw, ah, c.accumulator_threshold);
        let index = EdgeIndex::new(&edge_points, w, h, EDGE_CELL);

        let min_dist_sq = c.min_dist * c.min_dist;
        let mut circles: Vec<CircleCandidate> = Vec::new();
        let mut measured = 0usize;
        for (idx, votes) in peaks {
            let (ax, ay) = refine_peak(&accum, aw, ah, idx);
            let (cx, cy) = (ax * dp, ay * dp);
            let crowded = circles.iter().any(|k| {
                let dx = k.x - cx;
                let dy = k.y - cy;
                dx * dx + dy * dy < min_dist_sq
            });
            if crowded {
                continue;
            }
            if measured >= c.max_candidates {
                debug!("hough: stopping after {measured} measured peaks");
                break;
            }
            measured += 1;

            let Some((radius, radial_support)) = self.estimate_radius(&index, cx, cy) else {
                continue;
            };
            let required = c.min_arc_fraction * 2.0 * PI * radius;
            if (radial_support as f32) < required {
                continue;
            }
            circles.push(CircleCandidate {
                x: cx,
                y: cy,
                radius,
                votes,
            });
        }
        circles
    }

    /// Measures the disk interior against its boundary band.
    pub fn score(&self, gray: &GrayImage, candidate: &CircleCandidate) -> Option<CircleScore> {
        let (inside_mean, edge_mean) = disk_and_ring_means(
            gray,
            candidate.x,
            candidate.y,
            candidate.radius,
            self.config.edge_ring_width,
        )?;
        Some(CircleScore {
            inside_mean,
            edge_mean,
            contrast: inside_mean / (edge_mean + CONTRAST_EPSILON),
            brightness: inside_mean / 255.0,
        })
    }

    fn to_detection(&self, gray: &GrayImage, candidate: &CircleCandidate) -> Option<Detection> {
        let c = &self.config;
        let score = self.score(gray, candidate)?;
        let accepted = (score.contrast > c.min_contrast && score.brightness > c.min_brightness)
            || score.brightness > c.bright_override;
        if !accepted {
            return None;
        }
        let confidence = ((score.contrast - 1.0) * 0.5 + score.brightness * 0.5)
            .min(c.max_confidence)
            .max(0.0);
        Some(Detection::circle(
            DetectionMethod::HoughCircle,
            (candidate.x, candidate.y),
            candidate.radius,
            confidence,
        ))
    }

    /// Picks the radius whose ±1 px window holds the most edge points per
    /// unit of radius, and returns the mean distance of those points with
    /// the window count.
    fn estimate_radius(&self, index: &EdgeIndex, cx: f32, cy: f32) -> Option<(f32, u32)> {
        let min_r = self.config.min_radius as usize;
        let max_r = self.config.max_radius as usize;
        let mut counts = vec![0u32; max_r + 2];
        let mut distances = Vec::new();

        for &(x, y) in index.near(cx, cy, max_r as f32 + 2.0) {
            let d = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
            let bin = d.round() as usize;
            if bin < min_r || bin > max_r {
                continue;
            }
            counts[bin] += 1;
            distances.push(d);
        }

        let mut best: Option<(usize, u32, f32)> = None;
        for bin in min_r..=max_r {
            let window = counts[bin - 1] + counts[bin] + counts[bin + 1];
            if window == 0 {
                continue;
            }
            let density = window as f32 / bin as f32;
            if density > best.map_or(0.0, |(_, _, v)| v) {
                best = Some((bin, window, density));
            }
        }
        let (bin, window, _) = best?;

        let centre = bin as f32;
        let (sum, n) = distances
            .iter()
            .filter(|&&d| (d - centre).abs() <= 1.5)
            .fold((0.0f32, 0u32), |(s, n), &d| (s + d, n + 1));
        if n == 0 {
            return None;
        }
        Some((sum / n as f32, window))
    }
}

const EDGE_CELL: usize = 32;

/// Edge points bucketed on a coarse grid so a radius search only visits the
/// neighbourhood of its center.
struct EdgeIndex {
    cell: usize,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<(f32, f32)>>,
}

impl EdgeIndex {
    fn new(points: &[(f32, f32)], width: u32, height: u32, cell: usize) -> Self {
        let cell = cell.max(1);
        let cols = (width as usize).div_ceil(cell).max(1);
        let rows = (height as usize).div_ceil(cell).max(1);
        let mut buckets = vec![Vec::new(); cols * rows];
        for &(x, y) in points {
            let col = (x.max(0.0) as usize / cell).min(cols - 1);
            let row = (y.max(0.0) as usize / cell).min(rows - 1);
            buckets[row * cols + col].push((x, y));
        }
        Self {
            cell,
            cols,
            rows,
            buckets,
        }
    }

    fn cell_range(&self, lo: f32, hi: f32, count: usize) -> (usize, usize) {
        let first = (lo.max(0.0) as usize / self.cell).min(count - 1);
        let last = (hi.max(0.0) as usize / self.cell).min(count - 1);
        (first, last)
    }

    /// Points in every cell overlapping the square of half-size `reach`
    /// around `(x, y)`.
    fn near(&self, x: f32, y: f32, reach: f32) -> impl Iterator<Item = &(f32, f32)> + '_ {
        let (c0, c1) = self.cell_range(x - reach, x + reach, self.cols);
        let (r0, r1) = self.cell_range(y - reach, y + reach, self.rows);
        (r0..=r1).flat_map(move |row| {
            (c0..=c1).flat_map(move |col| self.buckets[row * self.cols + col].iter())
        })
    }
}

/// 3x3 box sum of the vote accumulator.
fn neighbourhood_sum(accum: &[u32], w: usize, h: usize) -> Vec<u32> {
    let mut out = vec![0u32; accum.len()];
    for y in 0..h {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(h - 1);
        for x in 0..w {
            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(w - 1);
            let mut s = 0u32;
            for yy in y0..=y1 {
                for xx in x0..=x1 {
                    s += accum[yy * w + xx];
                }
            }
            out[y * w + x] = s;
        }
    }
    out
}

/// Local maxima above `threshold`, sorted by value (highest first). Plateaus
/// resolve to their first pixel in raster order.
fn local_maxima(values: &[u32], w: usize, h: usize, threshold: f32) -> Vec<(usize, u32)> {
    let mut peaks = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            let val = values[idx];
            if (val as f32) < threshold || val == 0 {
                continue;
            }
            let mut is_max = true;
            'scan: for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let nidx = ny * w + nx;
                    if nidx == idx {
                        continue;
                    }
                    if values[nidx] > val || (values[nidx] == val && nidx < idx) {
                        is_max = false;
                        break 'scan;
                    }
                }
            }
            if is_max {
                peaks.push((idx, val));
            }
        }
    }
    peaks.sort_by(|a, b| b.1.cmp(&a.1));
    peaks
}

/// Vote-weighted centroid of the 3x3 neighbourhood around `idx`.
fn refine_peak(accum: &[u32], w: usize, h: usize, idx: usize) -> (f32, f32) {
    let (px, py) = (idx % w, idx / w);
    let mut sx = 0f64;
    let mut sy = 0f64;
    let mut total = 0f64;
    for y in py.saturating_sub(1)..=(py + 1).min(h - 1) {
        for x in px.saturating_sub(1)..=(px + 1).min(w - 1) {
            let v = accum[y * w + x] as f64;
            sx += v * x as f64;
            sy += v * y as f64;
            total += v;
        }
    }
    if total <= 0.0 {
        return (px as f32, py as f32);
    }
    ((sx / total) as f32, (sy / total) as f32)
}

/// Mean intensity inside the disk and along a band of `ring_width` pixels
/// centred on its boundary. `None` when the disk has no pixel in the image.
fn disk_and_ring_means(
    gray: &GrayImage,
    cx: f32,
    cy: f32,
    radius: f32,
    ring_width: f32,
) -> Option<(f32, f32)> {
    let (w, h) = gray.dimensions();
    let half_band = ring_width * 0.5;
    let reach = (radius + half_band).ceil() as i64 + 1;

    let x_lo = ((cx.round() as i64) - reach).max(0);
    let x_hi = ((cx.round() as i64) + reach).min(w as i64 - 1);
    let y_lo = ((cy.round() as i64) - reach).max(0);
    let y_hi = ((cy.round() as i64) + reach).min(h as i64 - 1);
    if x_lo > x_hi || y_lo > y_hi {
        return None;
    }

    let (mut inside_sum, mut inside_n) = (0u64, 0u64);
    let (mut ring_sum, mut ring_n) = (0u64, 0u64);
    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            let v = gray.get_pixel(x as u32, y as u32)[0] as u64;
            if d <= radius {
                inside_sum += v;
                inside_n += 1;
            }
            if (d - radius).abs() <= half_band {
                ring_sum += v;
                ring_n += 1;
            }
        }
    }
    if inside_n == 0 {
        return None;
    }
    let inside_mean = inside_sum as f32 / inside_n as f32;
    let edge_mean = if ring_n == 0 {
        0.0
    } else {
        ring_sum as f32 / ring_n as f32
    };
    Some((inside_mean, edge_mean))
}

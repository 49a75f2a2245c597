//! Shape measures over traced contours, shared by the blob and contour stages.

use std::f64::consts::PI;

use image::GrayImage;
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::geometry::{arc_length, convex_hull};
use imageproc::point::Point;
use kornia::{
    image::{Image, ImageSize, allocator::CpuAllocator},
    imgproc,
};

use super::error::DetectorError;

type CpuImage<T, const C: usize> = Image<T, C, CpuAllocator>;

/// Raw and derived spatial moments of a closed polygon.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m20: f64,
    pub m11: f64,
    pub m02: f64,
}

impl Moments {
    /// Polygon moments by Green's theorem. Orientation independent: a
    /// clockwise trace yields the same (positive) area as a counter-clockwise one.
    pub fn of_polygon(points: &[Point<u32>]) -> Self {
        let n = points.len();
        if n < 3 {
            return Self::default();
        }
        let mut m = Self::default();
        for i in 0..n {
            let (xi, yi) = (points[i].x as f64, points[i].y as f64);
            let next = points[(i + 1) % n];
            let (xj, yj) = (next.x as f64, next.y as f64);
            let a = xi * yj - xj * yi;
            m.m00 += a;
            m.m10 += (xi + xj) * a;
            m.m01 += (yi + yj) * a;
            m.m20 += (xi * xi + xi * xj + xj * xj) * a;
            m.m11 += (xi * yj + 2.0 * xi * yi + 2.0 * xj * yj + xj * yi) * a;
            m.m02 += (yi * yi + yi * yj + yj * yj) * a;
        }
        m.m00 /= 2.0;
        m.m10 /= 6.0;
        m.m01 /= 6.0;
        m.m20 /= 12.0;
        m.m11 /= 24.0;
        m.m02 /= 12.0;
        if m.m00 < 0.0 {
            m = Self {
                m00: -m.m00,
                m10: -m.m10,
                m01: -m.m01,
                m20: -m.m20,
                m11: -m.m11,
                m02: -m.m02,
            };
        }
        m
    }

    pub fn area(&self) -> f64 {
        self.m00
    }

    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.m00 <= f64::EPSILON {
            return None;
        }
        Some((self.m10 / self.m00, self.m01 / self.m00))
    }

    /// Ratio of the minor to the major second moment of inertia; 1.0 for a
    /// circle, towards 0.0 for a line.
    pub fn inertia_ratio(&self) -> f64 {
        let Some((cx, cy)) = self.centroid() else {
            return 0.0;
        };
        let mu20 = self.m20 - cx * self.m10;
        let mu02 = self.m02 - cy * self.m01;
        let mu11 = self.m11 - cx * self.m01;

        let denominator = ((2.0 * mu11).powi(2) + (mu20 - mu02).powi(2)).sqrt();
        if denominator <= 1e-2 {
            return 1.0;
        }
        let i_max = 0.5 * (mu20 + mu02) + 0.5 * denominator;
        let i_min = 0.5 * (mu20 + mu02) - 0.5 * denominator;
        if i_max <= f64::EPSILON {
            return 0.0;
        }
        (i_min / i_max).max(0.0)
    }
}

/// Absolute polygon area (shoelace).
pub fn polygon_area(points: &[Point<u32>]) -> f64 {
    Moments::of_polygon(points).area()
}

/// Closed perimeter of a traced contour.
pub fn perimeter(points: &[Point<u32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    arc_length(points, true)
}

/// `4π·area / perimeter²`, 1.0 for a perfect circle.
pub fn circularity(area: f64, perimeter: f64) -> f64 {
    if perimeter <= f64::EPSILON {
        return 0.0;
    }
    4.0 * PI * area / (perimeter * perimeter)
}

/// Contour area over the area of its convex hull.
pub fn convexity(points: &[Point<u32>], area: f64) -> f64 {
    let hull = convex_hull(points);
    let hull_area = polygon_area(&hull);
    if hull_area <= f64::EPSILON {
        return 0.0;
    }
    area / hull_area
}

/// Smallest circle containing every point, as `(cx, cy, radius)`.
pub fn min_enclosing_circle(points: &[Point<u32>]) -> Option<(f64, f64, f64)> {
    let pts: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    let first = *pts.first()?;
    let mut circle = (first.0, first.1, 0.0);

    for i in 1..pts.len() {
        if encloses(circle, pts[i]) {
            continue;
        }
        circle = (pts[i].0, pts[i].1, 0.0);
        for j in 0..i {
            if encloses(circle, pts[j]) {
                continue;
            }
            circle = circle_from_two(pts[i], pts[j]);
            for k in 0..j {
                if !encloses(circle, pts[k]) {
                    circle = circle_from_three(pts[i], pts[j], pts[k]);
                }
            }
        }
    }
    Some(circle)
}

fn encloses(circle: (f64, f64, f64), p: (f64, f64)) -> bool {
    let dx = p.0 - circle.0;
    let dy = p.1 - circle.1;
    (dx * dx + dy * dy).sqrt() <= circle.2 + 1e-7 * circle.2.max(1.0)
}

fn circle_from_two(a: (f64, f64), b: (f64, f64)) -> (f64, f64, f64) {
    let cx = (a.0 + b.0) / 2.0;
    let cy = (a.1 + b.1) / 2.0;
    let r = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt() / 2.0;
    (cx, cy, r)
}

fn circle_from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> (f64, f64, f64) {
    let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
    if d.abs() < 1e-12 {
        // collinear: the widest pair spans the other point
        return [circle_from_two(a, b), circle_from_two(a, c), circle_from_two(b, c)]
            .into_iter()
            .fold((0.0, 0.0, -1.0), |best, cand| if cand.2 > best.2 { cand } else { best });
    }
    let a2 = a.0 * a.0 + a.1 * a.1;
    let b2 = b.0 * b.0 + b.1 * b.1;
    let c2 = c.0 * c.0 + c.1 * c.1;
    let ux = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
    let uy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
    let r = ((a.0 - ux).powi(2) + (a.1 - uy).powi(2)).sqrt();
    (ux, uy, r)
}

/// Outermost foreground borders of a binary mask (non-zero is foreground).
pub fn external_contours(mask: &GrayImage) -> Vec<Contour<u32>> {
    find_contours::<u32>(mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .collect()
}

/// Binary mask: 255 where `gray > threshold`, 0 elsewhere.
pub fn threshold_mask(gray: &GrayImage, threshold: u8) -> Result<GrayImage, DetectorError> {
    let (width, height) = gray.dimensions();
    let src = CpuImage::<u8, 1>::new(
        ImageSize {
            width: width as usize,
            height: height as usize,
        },
        gray.as_raw().clone(),
        CpuAllocator,
    )?;
    let mut binary = CpuImage::<u8, 1>::from_size_val(src.size(), 0u8, CpuAllocator)?;
    imgproc::threshold::threshold_binary(&src, &mut binary, threshold, 255)?;
    GrayImage::from_raw(width, height, binary.as_slice().to_vec())
        .ok_or(DetectorError::Buffer { width, height })
}

/// True when every pixel of the mask is foreground: such a level has no
/// border to trace except the frame of the image itself.
pub fn is_saturated(mask: &GrayImage) -> bool {
    mask.as_raw().iter().all(|&v| v != 0)
}

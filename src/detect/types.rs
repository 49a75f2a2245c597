//! Value types shared by every detector in the cascade.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which detector produced a [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    HoughCircle,
    Blob,
    Contour,
}

impl DetectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMethod::HoughCircle => "hough_circle",
            DetectionMethod::Blob => "blob",
            DetectionMethod::Contour => "contour",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned rectangle in pixel coordinates, serialised as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Square box enclosing a circle.
    pub fn around_circle(center: (f32, f32), radius: f32) -> Self {
        let r = radius.max(0.0);
        Self {
            x1: center.0 - r,
            y1: center.1 - r,
            x2: center.0 + r,
            y2: center.1 + r,
        }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        // Normalise so x1 <= x2 and y1 <= y2 hold for deserialised input too.
        Self {
            x1: v[0].min(v[2]),
            y1: v[1].min(v[3]),
            x2: v[0].max(v[2]),
            y2: v[1].max(v[3]),
        }
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// A single round-object candidate.
///
/// Built once by a detector and never modified afterwards; the fuser only
/// reorders and drops detections. Serialises as
/// `{method, confidence, bbox: [x1,y1,x2,y2], center: [x,y], radius_px, diameter_px}`.
/// Deserialisation rebuilds the derived fields from center and radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DetectionRecord")]
pub struct Detection {
    method: DetectionMethod,
    confidence: f32,
    bbox: BoundingBox,
    center: [f32; 2],
    radius_px: f32,
    diameter_px: f32,
}

/// Wire fields a [`Detection`] is rebuilt from; `bbox` and `diameter_px`
/// are ignored on input.
#[derive(Deserialize)]
struct DetectionRecord {
    method: DetectionMethod,
    confidence: f32,
    center: [f32; 2],
    radius_px: f32,
}

impl From<DetectionRecord> for Detection {
    fn from(r: DetectionRecord) -> Self {
        Detection::circle(r.method, (r.center[0], r.center[1]), r.radius_px, r.confidence)
    }
}

impl Detection {
    /// Creates a circular detection. The confidence is clamped to `[0, 1]`
    /// and negative radii are treated as zero.
    pub fn circle(
        method: DetectionMethod,
        center: (f32, f32),
        radius: f32,
        confidence: f32,
    ) -> Self {
        let radius = if radius.is_finite() { radius.max(0.0) } else { 0.0 };
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            method,
            confidence,
            bbox: BoundingBox::around_circle(center, radius),
            center: [center.0, center.1],
            radius_px: radius,
            diameter_px: radius * 2.0,
        }
    }

    pub fn method(&self) -> DetectionMethod {
        self.method
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn center(&self) -> (f32, f32) {
        (self.center[0], self.center[1])
    }

    pub fn radius_px(&self) -> f32 {
        self.radius_px
    }

    pub fn diameter_px(&self) -> f32 {
        self.diameter_px
    }

    /// Euclidean distance between two detection centers.
    pub fn center_distance(&self, other: &Detection) -> f32 {
        let dx = self.center[0] - other.center[0];
        let dy = self.center[1] - other.center[1];
        (dx * dx + dy * dy).sqrt()
    }
}

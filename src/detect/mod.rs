//! Classical round-object detection: a Hough stage, a blob stage and a
//! contour fallback, fused into at most three ranked detections.

pub mod blob;
pub mod contour;
pub mod error;
pub mod fuse;
pub mod grid;
pub mod hough;
pub mod pipeline;
pub mod shape;
pub mod types;

pub use blob::{BlobConfig, BlobDetector, BlobKeypoint};
pub use contour::{ContourConfig, ContourDetector};
pub use error::{DetectorError, PipelineError};
pub use fuse::DetectionFuser;
pub use grid::{DecodeError, PixelGrid, decode_image};
pub use hough::{CircleCandidate, CircleConfig, HoughCircleDetector};
pub use pipeline::{
    CascadeOutcome, DetectionPipeline, Detector, LazyDetector, PipelineConfig, RunCondition, Stage,
    StageReport, StageStatus,
};
pub use types::{BoundingBox, Detection, DetectionMethod};

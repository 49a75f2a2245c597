use kornia::image::ImageError;

use super::grid::DecodeError;
use super::types::DetectionMethod;

/// Failure inside a single detector stage.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("kornia image error: {0}")]
    Kornia(#[from] ImageError),

    #[error("intermediate buffer for {width}x{height} image is inconsistent")]
    Buffer { width: u32, height: u32 },

    #[error("{method} stage failed: {reason}")]
    Stage {
        method: DetectionMethod,
        reason: String,
    },
}

/// Error surfaced by the fallible pipeline entry point.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Detector(#[from] DetectorError),
}

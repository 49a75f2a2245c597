pub mod detect;
pub mod frame;
pub mod plot;

#[cfg(test)]
pub(crate) mod test_utils;

pub use detect::{
    DecodeError, Detection, DetectionMethod, DetectionPipeline, Detector, PipelineConfig, PixelGrid,
};
pub use frame::{DetectionEnvelope, FrameMetadata};

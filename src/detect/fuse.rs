//! Final ranking of the cascade output.

use std::cmp::Ordering;

use super::types::Detection;

pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Ranks detections by confidence and keeps the best `max_results`.
///
/// Overlap removal already happened inside the cascade; the fuser only
/// reorders and truncates. The sort is stable, so equal confidences keep
/// cascade order and the earlier, more trusted stage wins the tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionFuser {
    max_results: usize,
}

impl Default for DetectionFuser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESULTS)
    }
}

impl DetectionFuser {
    pub fn new(max_results: usize) -> Self {
        Self { max_results }
    }

    pub fn fuse(&self, mut detections: Vec<Detection>) -> Vec<Detection> {
        detections.sort_by(|a, b| {
            b.confidence()
                .partial_cmp(&a.confidence())
                .unwrap_or(Ordering::Equal)
        });
        detections.truncate(self.max_results);
        detections
    }
}

//! Frame metadata passed through alongside detections, and on-disk archival
//! of decoded frames.
//!
//! None of this feeds the detectors; it is what a caller echoes back next to
//! the `golf_balls` list.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::detect::{Detection, PixelGrid};

/// Sensor values supplied with an uploaded frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub timestamp: Option<String>,
    pub frame_number: Option<u64>,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
}

impl FrameMetadata {
    /// Metadata for the `index`-th image of a batch. Frame numbers count up
    /// from the given one (or from 0); the other fields are shared.
    pub fn nth_in_batch(&self, index: usize) -> Self {
        Self {
            frame_number: Some(self.frame_number.unwrap_or(0) + index as u64),
            ..self.clone()
        }
    }
}

/// Response body: the metadata fields plus the ranked detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEnvelope {
    #[serde(flatten)]
    pub metadata: FrameMetadata,
    pub golf_balls: Vec<Detection>,
}

impl DetectionEnvelope {
    pub fn new(metadata: FrameMetadata, golf_balls: Vec<Detection>) -> Self {
        Self {
            metadata,
            golf_balls,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encode error: {0}")]
    Image(#[from] image::ImageError),
}

/// `frame_{frame_number}_{timestamp}.jpg`. Missing values become `unknown`
/// and timestamp characters outside `[A-Za-z0-9_-]` become `_`.
///
/// Identical metadata maps to the same name, so a second frame with the same
/// number and timestamp replaces the first.
pub fn archive_file_name(metadata: &FrameMetadata) -> String {
    let number = metadata
        .frame_number
        .map_or_else(|| "unknown".to_string(), |n| n.to_string());
    let stamp = match metadata.timestamp.as_deref() {
        Some(ts) if !ts.is_empty() => ts
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect(),
        _ => "unknown".to_string(),
    };
    format!("frame_{number}_{stamp}.jpg")
}

pub fn archive_path(dir: &Path, metadata: &FrameMetadata) -> PathBuf {
    dir.join(archive_file_name(metadata))
}

/// Writes the frame's color plane as JPEG under `dir`, creating it if needed.
pub fn archive_frame(
    dir: &Path,
    metadata: &FrameMetadata,
    grid: &PixelGrid,
) -> Result<PathBuf, ArchiveError> {
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)?;
    }
    let path = archive_path(dir, metadata);
    grid.rgb().save(&path)?;
    debug!("archived frame to {}", path.display());
    Ok(path)
}

//! Cascade orchestration: decode once, run the stages in order, fuse.

use std::fmt;
use std::sync::{Arc, OnceLock};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::blob::{BlobConfig, BlobDetector};
use super::contour::{ContourConfig, ContourDetector};
use super::error::{DetectorError, PipelineError};
use super::fuse::{DEFAULT_MAX_RESULTS, DetectionFuser};
use super::grid::{PixelGrid, decode_image};
use super::hough::{CircleConfig, HoughCircleDetector};
use super::types::{Detection, DetectionMethod};

/// A detection strategy: grid in, candidate detections out.
///
/// `prior` holds what earlier stages of the cascade already accepted.
pub trait Detector: Send + Sync {
    fn method(&self) -> DetectionMethod;

    fn detect(
        &self,
        grid: &PixelGrid,
        prior: &[Detection],
    ) -> Result<Vec<Detection>, DetectorError>;
}

impl Detector for HoughCircleDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::HoughCircle
    }

    fn detect(
        &self,
        grid: &PixelGrid,
        _prior: &[Detection],
    ) -> Result<Vec<Detection>, DetectorError> {
        Ok(self.detect_circles(grid))
    }
}

impl Detector for BlobDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Blob
    }

    fn detect(
        &self,
        grid: &PixelGrid,
        prior: &[Detection],
    ) -> Result<Vec<Detection>, DetectorError> {
        self.detect_blobs(grid, prior)
    }
}

impl Detector for ContourDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Contour
    }

    fn detect(
        &self,
        grid: &PixelGrid,
        _prior: &[Detection],
    ) -> Result<Vec<Detection>, DetectorError> {
        self.detect_contours(grid)
    }
}

type Init<D> = Box<dyn Fn() -> Result<D, String> + Send + Sync>;

/// Detector built on first use.
///
/// Construction runs at most once even when several threads hit the
/// detector at the same time; later calls share the result. A failed
/// construction is remembered and reported on every call.
pub struct LazyDetector<D> {
    method: DetectionMethod,
    init: Init<D>,
    cell: OnceLock<Result<D, String>>,
}

impl<D: Detector> LazyDetector<D> {
    pub fn new<F>(method: DetectionMethod, init: F) -> Self
    where
        F: Fn() -> Result<D, String> + Send + Sync + 'static,
    {
        Self {
            method,
            init: Box::new(init),
            cell: OnceLock::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    fn get(&self) -> Result<&D, DetectorError> {
        match self.cell.get_or_init(|| (self.init)()) {
            Ok(inner) => Ok(inner),
            Err(reason) => Err(DetectorError::Stage {
                method: self.method,
                reason: format!("initialisation failed: {reason}"),
            }),
        }
    }
}

impl<D> fmt::Debug for LazyDetector<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyDetector")
            .field("method", &self.method)
            .field("initialized", &self.cell.get().is_some())
            .finish()
    }
}

impl<D: Detector> Detector for LazyDetector<D> {
    fn method(&self) -> DetectionMethod {
        self.method
    }

    fn detect(
        &self,
        grid: &PixelGrid,
        prior: &[Detection],
    ) -> Result<Vec<Detection>, DetectorError> {
        self.get()?.detect(grid, prior)
    }
}

/// When a stage is allowed to run, given the detections accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCondition {
    Always,
    FewerThan(usize),
}

impl RunCondition {
    pub fn allows(self, accumulated: usize) -> bool {
        match self {
            RunCondition::Always => true,
            RunCondition::FewerThan(n) => accumulated < n,
        }
    }
}

#[derive(Clone)]
pub struct Stage {
    detector: Arc<dyn Detector>,
    condition: RunCondition,
}

impl Stage {
    pub fn new(detector: Arc<dyn Detector>, condition: RunCondition) -> Self {
        Self { detector, condition }
    }

    pub fn method(&self) -> DetectionMethod {
        self.detector.method()
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("method", &self.detector.method())
            .field("condition", &self.condition)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Ran { found: usize },
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub method: DetectionMethod,
    pub status: StageStatus,
}

/// Fused detections together with what every stage did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeOutcome {
    pub detections: Vec<Detection>,
    pub stages: Vec<StageReport>,
}

impl CascadeOutcome {
    pub fn ran(&self, method: DetectionMethod) -> bool {
        self.stages
            .iter()
            .any(|s| s.method == method && !matches!(s.status, StageStatus::Skipped))
    }
}

/// Tunables for the standard three-stage cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_results: usize,
    pub circle: CircleConfig,
    pub blob: BlobConfig,
    pub contour: ContourConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            circle: CircleConfig::default(),
            blob: BlobConfig::default(),
            contour: ContourConfig::default(),
        }
    }
}

/// Entry point of the detection core.
///
/// The standard cascade runs the Hough stage, then the blob stage when fewer
/// than two circles were found, then the contour stage when nothing at all
/// was found. Each call owns its buffers, so one pipeline can be shared
/// between threads.
#[derive(Debug, Clone)]
pub struct DetectionPipeline {
    stages: Vec<Stage>,
    fuser: DetectionFuser,
}

impl Default for DetectionPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl DetectionPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let stages = vec![
            Stage::new(
                Arc::new(HoughCircleDetector::new(config.circle)),
                RunCondition::Always,
            ),
            Stage::new(
                Arc::new(BlobDetector::new(config.blob)),
                RunCondition::FewerThan(2),
            ),
            Stage::new(
                Arc::new(ContourDetector::new(config.contour)),
                RunCondition::FewerThan(1),
            ),
        ];
        Self::with_stages(stages, config.max_results)
    }

    /// Builds a cascade from arbitrary stages, run in the given order.
    pub fn with_stages(stages: Vec<Stage>, max_results: usize) -> Self {
        Self {
            stages,
            fuser: DetectionFuser::new(max_results),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Best-effort detection on encoded bytes. Never fails: undecodable
    /// input and failing stages are logged and yield fewer (or no) results.
    pub fn detect(&self, bytes: &[u8]) -> Vec<Detection> {
        match decode_image(bytes) {
            Ok(grid) => self.detect_grid(&grid),
            Err(err) => {
                warn!("decode failed, returning no detections: {err}");
                Vec::new()
            }
        }
    }

    /// Best-effort detection on an already decoded grid.
    pub fn detect_grid(&self, grid: &PixelGrid) -> Vec<Detection> {
        self.run_cascade(grid).detections
    }

    /// Strict variant: decode errors and the first failing stage are returned
    /// instead of being skipped.
    pub fn try_detect(&self, bytes: &[u8]) -> Result<Vec<Detection>, PipelineError> {
        let grid = decode_image(bytes)?;
        let outcome = self.cascade(&grid, true)?;
        Ok(outcome.detections)
    }

    /// Runs the cascade and reports what every stage did.
    pub fn run_cascade(&self, grid: &PixelGrid) -> CascadeOutcome {
        self.cascade(grid, false).unwrap_or_else(|err| {
            warn!("cascade aborted: {err}");
            CascadeOutcome::default()
        })
    }

    fn cascade(&self, grid: &PixelGrid, strict: bool) -> Result<CascadeOutcome, DetectorError> {
        let mut accumulated: Vec<Detection> = Vec::new();
        let mut reports = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let method = stage.method();
            if !stage.condition.allows(accumulated.len()) {
                debug!("{method}: skipped with {} detections", accumulated.len());
                reports.push(StageReport {
                    method,
                    status: StageStatus::Skipped,
                });
                continue;
            }
            match stage.detector.detect(grid, &accumulated) {
                Ok(found) => {
                    debug!("{method}: {} detections", found.len());
                    reports.push(StageReport {
                        method,
                        status: StageStatus::Ran { found: found.len() },
                    });
                    accumulated.extend(found);
                }
                Err(err) if strict => return Err(err),
                Err(err) => {
                    warn!("{method}: stage failed, continuing cascade: {err}");
                    reports.push(StageReport {
                        method,
                        status: StageStatus::Failed(err.to_string()),
                    });
                }
            }
        }

        let detections = self.fuser.fuse(accumulated);
        debug!("cascade finished with {} detections", detections.len());
        Ok(CascadeOutcome {
            detections,
            stages: reports,
        })
    }
}

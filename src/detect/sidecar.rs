//! Detector backed by a JSON sidecar written by an external inference process.
//!
//! The model process watches the same frame source and writes its detections
//! for the latest frame to `detections_path` as
//! `[{"bbox": [x1, y1, x2, y2], "confidence": c, "class": "car"}, ...]`.
//!
//! A sidecar last written before the frame was captured belongs to an older
//! frame and is refused.

use crate::detect::{Detection, VehicleDetector};
use crate::error::AppError;
use crate::frame::Frame;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SidecarDetector {
    path: PathBuf,
}

impl SidecarDetector {
    /// Fails with `DetectorUnavailable` when the sidecar does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        if !path.is_file() {
            return Err(AppError::DetectorUnavailable(format!(
                "detections file not found: {}",
                path.display()
            )));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_fresh(&self, frame: &Frame) -> Result<(), AppError> {
        let Some(captured_at) = frame.captured_at() else {
            return Ok(());
        };
        let written_at = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(written_at) => written_at,
            Err(err) => {
                debug!(error = %err, "Sidecar modification time unavailable");
                return Ok(());
            }
        };
        if written_at < captured_at {
            let lag = captured_at
                .duration_since(written_at)
                .unwrap_or_default()
                .as_secs_f64();
            warn!(
                path = %self.path.display(),
                lag_secs = lag,
                "Detections are older than the frame"
            );
            return Err(AppError::Detector(format!(
                "detections {} are {lag:.3}s older than the frame",
                self.path.display()
            )));
        }
        Ok(())
    }
}

impl VehicleDetector for SidecarDetector {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, AppError> {
        self.ensure_fresh(frame)?;
        let contents = std::fs::read_to_string(&self.path).map_err(|err| {
            AppError::Detector(format!(
                "failed to read detections {}: {err}",
                self.path.display()
            ))
        })?;
        let detections: Vec<Detection> = serde_json::from_str(&contents).map_err(|err| {
            AppError::Detector(format!(
                "failed to parse detections {}: {err}",
                self.path.display()
            ))
        })?;
        debug!(
            count = detections.len(),
            width = frame.width(),
            height = frame.height(),
            "Detections loaded"
        );
        Ok(detections)
    }
}

use crate::detect::{Detection, ObjectClass, VehicleDetector};
use crate::error::AppError;
use crate::frame::Frame;
use crate::geometry::BoundingBox;

/// Detector returning a fixed detection list, or failing every call.
#[derive(Debug, Clone)]
pub struct MockDetector {
    detections: Vec<Detection>,
    fail: bool,
}

impl MockDetector {
    pub fn with_detections(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            fail: false,
        }
    }

    pub fn empty() -> Self {
        Self::with_detections(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            detections: Vec::new(),
            fail: true,
        }
    }

    /// Convenience for a car detection from `[x1, y1, x2, y2]`.
    pub fn car(bbox: [f64; 4], confidence: f64) -> Detection {
        Detection {
            bbox: BoundingBox::from(bbox),
            confidence,
            class: ObjectClass::Car,
        }
    }
}

impl VehicleDetector for MockDetector {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn detect(&self, _frame: &Frame) -> Result<Vec<Detection>, AppError> {
        if self.fail {
            Err(AppError::Detector("mock inference failed".to_string()))
        } else {
            Ok(self.detections.clone())
        }
    }
}

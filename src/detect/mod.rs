use crate::error::AppError;
use crate::frame::Frame;
use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

pub mod mock;
pub mod sidecar;

/// Object classes an external detector may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Car,
    Truck,
    Bus,
    Motorcycle,
    Person,
    #[serde(other)]
    Unknown,
}

/// One detected object in pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub class: ObjectClass,
}

/// Black-box object detector.
///
/// Implementations run inference once per frame and return every detection;
/// class and confidence filtering happens in the occupancy strategy.
pub trait VehicleDetector: Send + Sync + std::fmt::Debug {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    fn detect(&self, frame: &Frame) -> Result<Vec<Detection>, AppError>;
}

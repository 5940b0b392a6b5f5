//! Detection-overlap occupancy: best IoU between a slot's envelope and the
//! vehicle boxes reported by the detector for the frame.

use crate::detect::{Detection, ObjectClass, VehicleDetector};
use crate::error::AppError;
use crate::frame::Frame;
use crate::geometry::BoundingBox;
use crate::occupancy::model::{
    DetectionMethod, MatchedVehicle, OccupancyStatus, OccupancyStrategy, SlotVerdict,
};
use crate::slots::ResolvedSlot;
use serde::Deserialize;
use tracing::{debug, info};

pub const DEFAULT_OCCUPIED_THRESHOLD: f64 = 0.30;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.35;

#[derive(Debug, Clone, Deserialize)]
pub struct OverlapParams {
    /// Minimum IoU for a slot to count as occupied.
    #[serde(default = "default_occupied_threshold")]
    pub occupied_threshold: f64,
    /// Detections below this confidence are ignored.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_vehicle_classes")]
    pub vehicle_classes: Vec<ObjectClass>,
}

fn default_occupied_threshold() -> f64 {
    DEFAULT_OCCUPIED_THRESHOLD
}

fn default_min_confidence() -> f64 {
    DEFAULT_MIN_CONFIDENCE
}

fn default_vehicle_classes() -> Vec<ObjectClass> {
    vec![ObjectClass::Car]
}

impl Default for OverlapParams {
    fn default() -> Self {
        Self {
            occupied_threshold: DEFAULT_OCCUPIED_THRESHOLD,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            vehicle_classes: default_vehicle_classes(),
        }
    }
}

/// Best match between one slot envelope and a set of vehicle boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapMatch<'a> {
    pub occupied: bool,
    pub max_iou: f64,
    pub vehicle: Option<&'a Detection>,
}

/// Track the highest IoU over all vehicles; occupied iff it reaches `threshold`.
pub fn check_slot_occupancy<'a>(
    slot_box: &BoundingBox,
    vehicles: &'a [Detection],
    threshold: f64,
) -> OverlapMatch<'a> {
    let mut max_iou = 0.0;
    let mut vehicle = None;

    for candidate in vehicles {
        let iou = slot_box.iou(&candidate.bbox);
        if iou > max_iou {
            max_iou = iou;
            vehicle = Some(candidate);
        }
    }

    OverlapMatch {
        occupied: vehicle.is_some() && max_iou >= threshold,
        max_iou,
        vehicle,
    }
}

#[derive(Debug)]
pub struct DetectionOverlapStrategy {
    detector: Box<dyn VehicleDetector>,
    params: OverlapParams,
}

impl DetectionOverlapStrategy {
    pub fn new(detector: Box<dyn VehicleDetector>, params: OverlapParams) -> Result<Self, AppError> {
        if !(0.0..=1.0).contains(&params.occupied_threshold) {
            return Err(AppError::InvalidStrategy(format!(
                "occupied_threshold must be within [0, 1], got {}",
                params.occupied_threshold
            )));
        }
        if params.vehicle_classes.is_empty() {
            return Err(AppError::InvalidStrategy(
                "vehicle_classes must name at least one class".to_string(),
            ));
        }
        Ok(Self { detector, params })
    }

    pub fn params(&self) -> &OverlapParams {
        &self.params
    }

    /// Run the detector once and keep vehicle-class boxes above the confidence floor.
    pub fn detect_vehicles(&self, frame: &Frame) -> Result<Vec<Detection>, AppError> {
        let detections = self.detector.detect(frame)?;
        let total = detections.len();
        let vehicles: Vec<Detection> = detections
            .into_iter()
            .filter(|detection| {
                self.params.vehicle_classes.contains(&detection.class)
                    && detection.confidence >= self.params.min_confidence
            })
            .collect();
        info!(
            detector = self.detector.name(),
            detections = total,
            vehicles = vehicles.len(),
            "Vehicle detection complete"
        );
        Ok(vehicles)
    }
}

impl OccupancyStrategy for DetectionOverlapStrategy {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::DetectionOverlap
    }

    fn evaluate_slots(
        &self,
        frame: &Frame,
        slots: &[ResolvedSlot],
    ) -> Result<Vec<SlotVerdict>, AppError> {
        let vehicles = self.detect_vehicles(frame)?;

        let verdicts = slots
            .iter()
            .map(|slot| {
                let overlap = check_slot_occupancy(
                    &slot.bounding_box(),
                    &vehicles,
                    self.params.occupied_threshold,
                );
                let status = OccupancyStatus::from_occupied(overlap.occupied);
                debug!(
                    slot_id = ?slot.slot_id,
                    slot_number = ?slot.slot_number,
                    iou = overlap.max_iou,
                    matched = overlap.vehicle.is_some(),
                    status = ?status,
                    "Detection overlap slot decision"
                );

                let matched_vehicle = overlap
                    .vehicle
                    .filter(|_| overlap.occupied)
                    .map(|vehicle| MatchedVehicle {
                        bounding_box: vehicle.bbox.into(),
                        confidence: vehicle.confidence,
                        iou: overlap.max_iou,
                    });

                SlotVerdict {
                    status,
                    signal_value: overlap.max_iou,
                    confidence: 1.0,
                    pixel_count: None,
                    total_area: None,
                    matched_vehicle,
                }
            })
            .collect();
        Ok(verdicts)
    }
}

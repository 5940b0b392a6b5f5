//! Occupancy strategy trait and the per-slot result types it produces.
//!
//! Both strategies share one output contract so the orchestrator never needs
//! to know which one ran.

use crate::error::AppError;
use crate::frame::Frame;
use crate::geometry::BoundingBox;
use crate::slots::{ResolvedSlot, SlotId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyStatus {
    Occupied,
    Vacant,
}

impl OccupancyStatus {
    pub fn from_occupied(occupied: bool) -> Self {
        if occupied {
            Self::Occupied
        } else {
            Self::Vacant
        }
    }

    pub fn is_occupied(self) -> bool {
        matches!(self, Self::Occupied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    PixelSignal,
    DetectionOverlap,
}

/// Vehicle box attached to an occupied slot by the overlap strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedVehicle {
    pub bounding_box: VehicleBox,
    pub confidence: f64,
    pub iou: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl From<BoundingBox> for VehicleBox {
    fn from(bbox: BoundingBox) -> Self {
        Self {
            x1: bbox.x_min,
            y1: bbox.y_min,
            x2: bbox.x_max,
            y2: bbox.y_max,
        }
    }
}

/// Strategy decision for one slot, before identity is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotVerdict {
    pub status: OccupancyStatus,
    /// Pixel ratio or IoU the threshold was applied to.
    pub signal_value: f64,
    pub confidence: f64,
    pub pixel_count: Option<u64>,
    pub total_area: Option<u64>,
    pub matched_vehicle: Option<MatchedVehicle>,
}

/// Uniform result record, one per evaluated slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotOccupancyResult {
    pub slot_id: Option<SlotId>,
    pub slot_number: Option<u32>,
    pub status: OccupancyStatus,
    pub signal_value: f64,
    pub confidence: f64,
    pub method: DetectionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_area: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_vehicle: Option<MatchedVehicle>,
}

impl SlotOccupancyResult {
    pub fn new(slot: ResolvedSlot, verdict: SlotVerdict, method: DetectionMethod) -> Self {
        Self {
            slot_id: slot.slot_id,
            slot_number: slot.slot_number,
            status: verdict.status,
            signal_value: verdict.signal_value,
            confidence: verdict.confidence,
            method,
            pixel_count: verdict.pixel_count,
            total_area: verdict.total_area,
            matched_vehicle: verdict.matched_vehicle,
        }
    }
}

/// An occupancy algorithm applied to one frame and a batch of resolved slots.
pub trait OccupancyStrategy: Send + Sync + std::fmt::Debug {
    fn method(&self) -> DetectionMethod;

    /// Returns one verdict per slot, in input order.
    fn evaluate_slots(
        &self,
        frame: &Frame,
        slots: &[ResolvedSlot],
    ) -> Result<Vec<SlotVerdict>, AppError>;
}

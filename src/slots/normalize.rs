//! Coordinate normalizer: stored slot records to pixel-space polygons.
//!
//! Stored coordinates are always fractions of the slot's reference frame
//! (the frame the slot was drawn against). The reference falls back to the
//! evaluated frame's dimensions when the record does not carry one. Each
//! entry's encoding is resolved here, once, so strategies only ever see
//! [`PixelPoint`]s.

use crate::frame::FrameDimensions;
use crate::geometry::{BoundingBox, PixelPoint};
use crate::slots::{RawCoordinate, SlotId, SlotRecord};
use thiserror::Error;
use tracing::warn;

const MIN_POLYGON_POINTS: usize = 3;
const COLLINEAR_EPSILON: f64 = 1e-9;

/// A slot that failed normalization and is excluded from the pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedSlot {
    #[error("slot has no coordinates")]
    NoCoordinates,
    #[error("slot has {usable} usable points, at least 3 required")]
    TooFewPoints { usable: usize },
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),
}

/// Canonical slot in pixel space, ready for any strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSlot {
    pub slot_id: Option<SlotId>,
    pub slot_number: Option<u32>,
    pub points: Vec<PixelPoint>,
}

impl ResolvedSlot {
    pub fn bounding_box(&self) -> BoundingBox {
        // Construction guarantees at least three points.
        BoundingBox::enclosing(&self.points).unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }
}

/// Resolve a stored record against the frame being evaluated.
pub fn normalize_slot(
    record: &SlotRecord,
    frame: FrameDimensions,
) -> Result<ResolvedSlot, MalformedSlot> {
    if record.coordinates.is_empty() {
        return Err(MalformedSlot::NoCoordinates);
    }

    let reference = reference_dimensions(record, frame);
    let label = record.label();
    let mut points = Vec::with_capacity(record.coordinates.len());

    for (index, coordinate) in record.coordinates.iter().enumerate() {
        match fraction_of(coordinate) {
            Ok((x_norm, y_norm)) => points.push(PixelPoint::new(
                x_norm * reference.width,
                y_norm * reference.height,
            )),
            Err(reason) => {
                warn!(
                    slot = %label,
                    index = index,
                    reason = reason,
                    "Skipping malformed coordinate entry"
                );
            }
        }
    }

    if points.len() < MIN_POLYGON_POINTS {
        return Err(MalformedSlot::TooFewPoints {
            usable: points.len(),
        });
    }

    let bbox = BoundingBox::enclosing(&points).ok_or(MalformedSlot::NoCoordinates)?;
    if bbox.area() <= 0.0 {
        return Err(MalformedSlot::DegenerateGeometry("zero-area bounding box"));
    }
    if all_collinear(&points) {
        return Err(MalformedSlot::DegenerateGeometry("collinear points"));
    }

    Ok(ResolvedSlot {
        slot_id: record.slot_id.clone(),
        slot_number: record.slot_number,
        points,
    })
}

/// Inverse of the scaling in [`normalize_slot`], producing keyed fractions.
pub fn denormalize(points: &[PixelPoint], reference: FrameDimensions) -> Vec<RawCoordinate> {
    points
        .iter()
        .map(|point| RawCoordinate::Keyed {
            x: point.x / reference.width,
            y: point.y / reference.height,
        })
        .collect()
}

fn reference_dimensions(record: &SlotRecord, frame: FrameDimensions) -> FrameDimensions {
    FrameDimensions {
        width: usable_dimension(record.image_width).unwrap_or(frame.width),
        height: usable_dimension(record.image_height).unwrap_or(frame.height),
    }
}

fn usable_dimension(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn fraction_of(coordinate: &RawCoordinate) -> Result<(f64, f64), &'static str> {
    let (x, y) = match coordinate {
        RawCoordinate::Pair(values) if values.len() == 2 => (values[0], values[1]),
        RawCoordinate::Pair(_) => return Err("coordinate pair must have exactly two values"),
        RawCoordinate::Keyed { x, y } => (*x, *y),
        RawCoordinate::Unrecognized(_) => return Err("unrecognized coordinate shape"),
    };
    if !x.is_finite() || !y.is_finite() {
        return Err("coordinate is not finite");
    }
    Ok((x, y))
}

fn all_collinear(points: &[PixelPoint]) -> bool {
    let origin = points[0];
    let Some(far) = points.iter().copied().max_by(|a, b| {
        squared_distance(origin, *a).total_cmp(&squared_distance(origin, *b))
    }) else {
        return true;
    };
    let span = squared_distance(origin, far);
    if span <= 0.0 {
        return true;
    }

    points.iter().all(|point| {
        let cross = (far.x - origin.x) * (point.y - origin.y)
            - (far.y - origin.y) * (point.x - origin.x);
        cross.abs() <= COLLINEAR_EPSILON * span
    })
}

fn squared_distance(a: PixelPoint, b: PixelPoint) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dx * dx + dy * dy
}

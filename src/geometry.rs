//! Axis-aligned box geometry shared by the occupancy strategies.

use serde::{Deserialize, Serialize};

/// A point in absolute pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in pixel space, `[x_min, y_min, x_max, y_max]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    /// Envelope of a point set. Returns `None` for an empty set.
    pub fn enclosing(points: &[PixelPoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self::new(first.x, first.y, first.x, first.y);
        for point in &points[1..] {
            bbox.x_min = bbox.x_min.min(point.x);
            bbox.y_min = bbox.y_min.min(point.y);
            bbox.x_max = bbox.x_max.max(point.x);
            bbox.y_max = bbox.y_max.max(point.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Overlap area with another box, zero when the boxes are disjoint on either axis.
    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let inter_x_min = self.x_min.max(other.x_min);
        let inter_y_min = self.y_min.max(other.y_min);
        let inter_x_max = self.x_max.min(other.x_max);
        let inter_y_max = self.y_max.min(other.y_max);

        if inter_x_max < inter_x_min || inter_y_max < inter_y_min {
            return 0.0;
        }

        (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min)
    }

    /// Intersection-over-Union. `0.0` when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let inter_area = self.intersection_area(other);
        let union_area = self.area() + other.area() - inter_area;
        if union_area > 0.0 {
            (inter_area / union_area).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(value: [f64; 4]) -> Self {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(value: BoundingBox) -> Self {
        [value.x_min, value.y_min, value.x_max, value.y_max]
    }
}

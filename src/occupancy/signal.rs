//! Pixel-signal occupancy: count foreground texture inside each slot polygon.
//!
//! The frame is reduced once per pass to a binary foreground mask
//! (gray → 3x3 gaussian blur → inverted local-mean adaptive threshold → median →
//! dilation). Each slot then counts mask pixels inside its polygon, within the
//! polygon's bounding rectangle clipped to the frame.

use crate::error::AppError;
use crate::frame::Frame;
use crate::occupancy::model::{
    DetectionMethod, OccupancyStatus, OccupancyStrategy, SlotVerdict,
};
use crate::slots::ResolvedSlot;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::filter::{median_filter, separable_filter_equal};
use imageproc::morphology::dilate;
use imageproc::point::Point;
use serde::Deserialize;
use tracing::debug;

const FOREGROUND: u8 = 255;

/// Occupancy threshold, either an absolute pixel count or a fraction of the
/// slot's bounding-rectangle area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelThreshold {
    /// Occupied when `count >= n`.
    Absolute(u32),
    /// Occupied when `count / area > r`.
    Ratio(f64),
}

/// Parameters for the pixel-signal strategy, from `[strategy.pixel_signal]`.
#[derive(Debug, Clone, Deserialize)]
pub struct PixelSignalParams {
    #[serde(default)]
    pub absolute_pixel_threshold: Option<u32>,
    #[serde(default)]
    pub ratio_threshold: Option<f64>,
    /// Adaptive threshold neighbourhood, odd.
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    /// Subtracted from the local mean before comparison.
    #[serde(default = "default_offset")]
    pub offset: f64,
    /// Median filter window, odd.
    #[serde(default = "default_median_kernel")]
    pub median_kernel: u32,
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,
    /// Chebyshev radius of the dilation; 1 is a single 3x3 pass.
    #[serde(default = "default_dilation_radius")]
    pub dilation_radius: u8,
}

fn default_block_size() -> u32 {
    25
}

fn default_offset() -> f64 {
    16.0
}

fn default_median_kernel() -> u32 {
    5
}

fn default_blur_sigma() -> f32 {
    1.0
}

fn default_dilation_radius() -> u8 {
    1
}

impl Default for PixelSignalParams {
    fn default() -> Self {
        Self {
            absolute_pixel_threshold: None,
            ratio_threshold: Some(0.3),
            block_size: default_block_size(),
            offset: default_offset(),
            median_kernel: default_median_kernel(),
            blur_sigma: default_blur_sigma(),
            dilation_radius: default_dilation_radius(),
        }
    }
}

impl PixelSignalParams {
    /// Exactly one of the two threshold fields must be set.
    pub fn threshold(&self) -> Result<PixelThreshold, AppError> {
        match (self.absolute_pixel_threshold, self.ratio_threshold) {
            (Some(count), None) => Ok(PixelThreshold::Absolute(count)),
            (None, Some(ratio)) if ratio.is_finite() && ratio >= 0.0 => {
                Ok(PixelThreshold::Ratio(ratio))
            }
            (None, Some(ratio)) => Err(AppError::InvalidStrategy(format!(
                "ratio_threshold must be a non-negative number, got {ratio}"
            ))),
            (Some(_), Some(_)) => Err(AppError::InvalidStrategy(
                "set only one of absolute_pixel_threshold and ratio_threshold".to_string(),
            )),
            (None, None) => Err(AppError::InvalidStrategy(
                "one of absolute_pixel_threshold or ratio_threshold is required".to_string(),
            )),
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(AppError::InvalidStrategy(format!(
                "block_size must be odd and at least 3, got {}",
                self.block_size
            )));
        }
        if self.median_kernel == 0 || self.median_kernel % 2 == 0 {
            return Err(AppError::InvalidStrategy(format!(
                "median_kernel must be odd, got {}",
                self.median_kernel
            )));
        }
        if !(self.blur_sigma.is_finite() && self.blur_sigma > 0.0) {
            return Err(AppError::InvalidStrategy(format!(
                "blur_sigma must be positive, got {}",
                self.blur_sigma
            )));
        }
        if !self.offset.is_finite() {
            return Err(AppError::InvalidStrategy("offset must be finite".to_string()));
        }
        Ok(())
    }
}

/// Count and area measured for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotMeasurement {
    pub count: u64,
    /// Clipped bounding-rectangle area, floored to 1.
    pub area: u64,
}

impl SlotMeasurement {
    pub fn ratio(&self) -> f64 {
        self.count as f64 / self.area as f64
    }
}

#[derive(Debug, Clone)]
pub struct PixelSignalStrategy {
    params: PixelSignalParams,
    threshold: PixelThreshold,
}

impl PixelSignalStrategy {
    pub fn new(params: PixelSignalParams) -> Result<Self, AppError> {
        params.validate()?;
        let threshold = params.threshold()?;
        Ok(Self { params, threshold })
    }

    pub fn threshold(&self) -> PixelThreshold {
        self.threshold
    }

    /// Binary foreground mask for the whole frame.
    pub fn foreground_mask(&self, frame: &Frame) -> GrayImage {
        let gray = frame.to_gray();
        let blurred = gaussian_blur_3x3(&gray, self.params.blur_sigma);
        let thresholded =
            adaptive_mean_threshold_inv(&blurred, self.params.block_size / 2, self.params.offset);

        let median_radius = self.params.median_kernel / 2;
        let denoised = if median_radius > 0 {
            median_filter(&thresholded, median_radius, median_radius)
        } else {
            thresholded
        };

        if self.params.dilation_radius > 0 {
            dilate(&denoised, Norm::LInf, self.params.dilation_radius)
        } else {
            denoised
        }
    }

    /// Occupancy decision for one measured slot.
    pub fn decide(&self, measurement: SlotMeasurement) -> bool {
        match self.threshold {
            PixelThreshold::Absolute(count) => measurement.count >= u64::from(count),
            PixelThreshold::Ratio(ratio) => measurement.ratio() > ratio,
        }
    }
}

impl OccupancyStrategy for PixelSignalStrategy {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::PixelSignal
    }

    fn evaluate_slots(
        &self,
        frame: &Frame,
        slots: &[ResolvedSlot],
    ) -> Result<Vec<SlotVerdict>, AppError> {
        let mask = self.foreground_mask(frame);

        let verdicts = slots
            .iter()
            .map(|slot| {
                let measurement = measure_slot(&mask, slot);
                let status = OccupancyStatus::from_occupied(self.decide(measurement));
                debug!(
                    slot_id = ?slot.slot_id,
                    slot_number = ?slot.slot_number,
                    count = measurement.count,
                    area = measurement.area,
                    ratio = measurement.ratio(),
                    status = ?status,
                    "Pixel signal slot decision"
                );
                SlotVerdict {
                    status,
                    signal_value: measurement.ratio(),
                    confidence: 1.0,
                    pixel_count: Some(measurement.count),
                    total_area: Some(measurement.area),
                    matched_vehicle: None,
                }
            })
            .collect();
        Ok(verdicts)
    }
}

/// Count mask pixels inside the slot polygon.
///
/// The polygon's pixel-aligned bounding rectangle is clipped to the mask; a
/// rectangle entirely outside the frame yields a zero count. Vertices may lie
/// arbitrarily far outside the frame.
pub fn measure_slot(mask: &GrayImage, slot: &ResolvedSlot) -> SlotMeasurement {
    let (width, height) = (f64::from(mask.width()), f64::from(mask.height()));
    let vertices: Vec<(f64, f64)> = slot
        .points
        .iter()
        .map(|point| (point.x.trunc(), point.y.trunc()))
        .collect();

    let (Some(min_x), Some(max_x), Some(min_y), Some(max_y)) = (
        vertices.iter().map(|v| v.0).reduce(f64::min),
        vertices.iter().map(|v| v.0).reduce(f64::max),
        vertices.iter().map(|v| v.1).reduce(f64::min),
        vertices.iter().map(|v| v.1).reduce(f64::max),
    ) else {
        return SlotMeasurement { count: 0, area: 1 };
    };

    let left = min_x.max(0.0);
    let top = min_y.max(0.0);
    let right = (max_x + 1.0).min(width);
    let bottom = (max_y + 1.0).min(height);
    if !(right > left && bottom > top) {
        return SlotMeasurement { count: 0, area: 1 };
    }

    let (left, top) = (left as u32, top as u32);
    let crop_width = right as u32 - left;
    let crop_height = bottom as u32 - top;
    let crop = image::imageops::crop_imm(mask, left, top, crop_width, crop_height).to_image();

    // One pixel of margin keeps the clip edges off the frame's own pixels.
    let clipped = clip_polygon(&vertices, -1.0, -1.0, width, height);
    let points: Vec<(i64, i64)> = clipped
        .iter()
        .map(|&(x, y)| (x.round() as i64, y.round() as i64))
        .collect();
    let fill = polygon_fill(&points, i64::from(left), i64::from(top), crop_width, crop_height);
    let count = crop
        .pixels()
        .zip(fill.pixels())
        .filter(|(mask_px, fill_px)| mask_px[0] != 0 && fill_px[0] != 0)
        .count() as u64;

    SlotMeasurement {
        count,
        area: (u64::from(crop_width) * u64::from(crop_height)).max(1),
    }
}

#[derive(Debug, Clone, Copy)]
enum ClipEdge {
    Left(f64),
    Right(f64),
    Top(f64),
    Bottom(f64),
}

impl ClipEdge {
    fn inside(self, (x, y): (f64, f64)) -> bool {
        match self {
            ClipEdge::Left(bound) => x >= bound,
            ClipEdge::Right(bound) => x <= bound,
            ClipEdge::Top(bound) => y >= bound,
            ClipEdge::Bottom(bound) => y <= bound,
        }
    }

    /// Where segment `from`-`to` meets this edge; the endpoints straddle it.
    fn crossing(self, from: (f64, f64), to: (f64, f64)) -> (f64, f64) {
        match self {
            ClipEdge::Left(bound) | ClipEdge::Right(bound) => {
                let t = (bound - from.0) / (to.0 - from.0);
                (bound, from.1 + t * (to.1 - from.1))
            }
            ClipEdge::Top(bound) | ClipEdge::Bottom(bound) => {
                let t = (bound - from.1) / (to.1 - from.1);
                (from.0 + t * (to.0 - from.0), bound)
            }
        }
    }
}

/// Sutherland-Hodgman clip of a polygon against an axis-aligned box.
fn clip_polygon(
    vertices: &[(f64, f64)],
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
) -> Vec<(f64, f64)> {
    let mut polygon = vertices.to_vec();
    let edges = [
        ClipEdge::Left(min_x),
        ClipEdge::Right(max_x),
        ClipEdge::Top(min_y),
        ClipEdge::Bottom(max_y),
    ];

    for edge in edges {
        let Some(&last) = polygon.last() else {
            break;
        };
        let mut output = Vec::with_capacity(polygon.len() + 4);
        let mut previous = last;
        for &current in &polygon {
            match (edge.inside(previous), edge.inside(current)) {
                (true, true) => output.push(current),
                (true, false) => output.push(edge.crossing(previous, current)),
                (false, true) => {
                    output.push(edge.crossing(previous, current));
                    output.push(current);
                }
                (false, false) => {}
            }
            previous = current;
        }
        polygon = output;
    }
    polygon
}

fn polygon_fill(points: &[(i64, i64)], left: i64, top: i64, width: u32, height: u32) -> GrayImage {
    let mut fill = GrayImage::new(width, height);

    let mut shifted: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &(x, y) in points {
        let (Ok(x), Ok(y)) = (i32::try_from(x - left), i32::try_from(y - top)) else {
            continue;
        };
        let point = Point::new(x, y);
        if shifted.last() != Some(&point) {
            shifted.push(point);
        }
    }
    while shifted.len() > 1 && shifted.first() == shifted.last() {
        shifted.pop();
    }

    if shifted.len() >= 3 {
        draw_polygon_mut(&mut fill, &shifted, Luma([FOREGROUND]));
    } else {
        // Collapsed by pixel truncation; keep the remaining vertices.
        for point in shifted {
            if point.x >= 0 && point.y >= 0 && (point.x as u32) < width && (point.y as u32) < height {
                fill.put_pixel(point.x as u32, point.y as u32, Luma([FOREGROUND]));
            }
        }
    }
    fill
}

/// Blur with a fixed 3x3 gaussian kernel whose weights follow `sigma`.
pub fn gaussian_blur_3x3(image: &GrayImage, sigma: f32) -> GrayImage {
    separable_filter_equal(image, &gaussian_kernel_3(sigma))
}

fn gaussian_kernel_3(sigma: f32) -> [f32; 3] {
    let side = (-1.0 / (2.0 * sigma * sigma)).exp();
    let total = 1.0 + 2.0 * side;
    [side / total, 1.0 / total, side / total]
}

/// Inverted adaptive threshold against the local mean.
///
/// A pixel becomes foreground when it is at most `mean - offset`, the mean
/// taken over the `(2r+1)^2` window clipped to the image.
pub fn adaptive_mean_threshold_inv(image: &GrayImage, block_radius: u32, offset: f64) -> GrayImage {
    let (width, height) = image.dimensions();
    let table = summed_area_table(image);
    let stride = width as usize + 1;
    let mut output = GrayImage::new(width, height);

    for y in 0..height {
        let y0 = y.saturating_sub(block_radius) as usize;
        let y1 = (y + block_radius).min(height - 1) as usize + 1;
        for x in 0..width {
            let x0 = x.saturating_sub(block_radius) as usize;
            let x1 = (x + block_radius).min(width - 1) as usize + 1;

            let sum = table[y1 * stride + x1] + table[y0 * stride + x0]
                - table[y0 * stride + x1]
                - table[y1 * stride + x0];
            let count = ((x1 - x0) * (y1 - y0)) as f64;
            let mean = sum as f64 / count;

            if f64::from(image.get_pixel(x, y)[0]) <= mean - offset {
                output.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }
    output
}

fn summed_area_table(image: &GrayImage) -> Vec<u64> {
    let (width, height) = image.dimensions();
    let stride = width as usize + 1;
    let mut table = vec![0u64; stride * (height as usize + 1)];

    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += u64::from(image.get_pixel(x as u32, y as u32)[0]);
            table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row_sum;
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelPoint;
    use image::{Rgb, RgbImage};

    fn rect_slot(x0: f64, y0: f64, x1: f64, y1: f64) -> ResolvedSlot {
        ResolvedSlot {
            slot_id: None,
            slot_number: Some(1),
            points: vec![
                PixelPoint::new(x0, y0),
                PixelPoint::new(x1, y0),
                PixelPoint::new(x1, y1),
                PixelPoint::new(x0, y1),
            ],
        }
    }

    fn striped_frame(width: u32, height: u32, stripe_region: (u32, u32, u32, u32)) -> Frame {
        let (sx0, sy0, sx1, sy1) = stripe_region;
        let image = RgbImage::from_fn(width, height, |x, y| {
            let inside = x >= sx0 && x < sx1 && y >= sy0 && y < sy1;
            if inside && (x / 2) % 2 == 0 {
                Rgb([20, 20, 20])
            } else if inside {
                Rgb([230, 230, 230])
            } else {
                Rgb([128, 128, 128])
            }
        });
        Frame::new(image).expect("frame")
    }

    fn ratio_params(ratio: f64) -> PixelSignalParams {
        PixelSignalParams {
            ratio_threshold: Some(ratio),
            ..PixelSignalParams::default()
        }
    }

    #[test]
    fn threshold_requires_exactly_one_field() {
        let both = PixelSignalParams {
            absolute_pixel_threshold: Some(900),
            ratio_threshold: Some(0.2),
            ..PixelSignalParams::default()
        };
        let neither = PixelSignalParams {
            absolute_pixel_threshold: None,
            ratio_threshold: None,
            ..PixelSignalParams::default()
        };
        let absolute = PixelSignalParams {
            absolute_pixel_threshold: Some(900),
            ratio_threshold: None,
            ..PixelSignalParams::default()
        };

        assert!(matches!(both.threshold(), Err(AppError::InvalidStrategy(_))));
        assert!(matches!(neither.threshold(), Err(AppError::InvalidStrategy(_))));
        assert_eq!(absolute.threshold().ok(), Some(PixelThreshold::Absolute(900)));
    }

    #[test]
    fn rejects_even_block_size_and_zero_sigma() {
        let even = PixelSignalParams {
            block_size: 24,
            ..ratio_params(0.3)
        };
        let flat = PixelSignalParams {
            blur_sigma: 0.0,
            ..ratio_params(0.3)
        };

        assert!(PixelSignalStrategy::new(even).is_err());
        assert!(PixelSignalStrategy::new(flat).is_err());
    }

    #[test]
    fn uniform_image_has_no_foreground() {
        let image = GrayImage::from_pixel(16, 16, Luma([128]));
        let mask = adaptive_mean_threshold_inv(&image, 3, 16.0);
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn dark_pixel_on_bright_field_is_foreground() {
        let mut image = GrayImage::from_pixel(9, 9, Luma([200]));
        image.put_pixel(4, 4, Luma([10]));

        let mask = adaptive_mean_threshold_inv(&image, 2, 16.0);

        assert_eq!(mask.get_pixel(4, 4)[0], FOREGROUND);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn textured_slot_is_occupied_and_flat_slot_is_vacant() -> Result<(), AppError> {
        let frame = striped_frame(120, 60, (10, 10, 50, 50));
        let strategy = PixelSignalStrategy::new(ratio_params(0.3))?;
        let slots = vec![
            rect_slot(12.0, 12.0, 48.0, 48.0),
            rect_slot(70.0, 12.0, 110.0, 48.0),
        ];

        let verdicts = strategy.evaluate_slots(&frame, &slots)?;

        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].status, OccupancyStatus::Occupied);
        assert!(verdicts[0].signal_value > 0.3);
        assert_eq!(verdicts[1].status, OccupancyStatus::Vacant);
        assert_eq!(verdicts[1].pixel_count, Some(0));
        assert_eq!(verdicts[1].signal_value, 0.0);
        Ok(())
    }

    #[test]
    fn absolute_threshold_compares_raw_count() -> Result<(), AppError> {
        let frame = striped_frame(60, 60, (10, 10, 50, 50));
        let slots = vec![rect_slot(12.0, 12.0, 48.0, 48.0)];

        let low = PixelSignalStrategy::new(PixelSignalParams {
            absolute_pixel_threshold: Some(10),
            ratio_threshold: None,
            ..PixelSignalParams::default()
        })?;
        let high = PixelSignalStrategy::new(PixelSignalParams {
            absolute_pixel_threshold: Some(10_000),
            ratio_threshold: None,
            ..PixelSignalParams::default()
        })?;

        let low_verdict = &low.evaluate_slots(&frame, &slots)?[0];
        let high_verdict = &high.evaluate_slots(&frame, &slots)?[0];

        assert_eq!(low_verdict.status, OccupancyStatus::Occupied);
        assert_eq!(high_verdict.status, OccupancyStatus::Vacant);
        // Ratio is reported whichever branch decides.
        assert_eq!(low_verdict.signal_value, high_verdict.signal_value);
        Ok(())
    }

    #[test]
    fn bounding_rectangle_is_clipped_to_frame() {
        let mask = GrayImage::from_pixel(20, 10, Luma([FOREGROUND]));
        let slot = rect_slot(15.0, 5.0, 40.0, 30.0);

        let measurement = measure_slot(&mask, &slot);

        assert_eq!(measurement.area, 5 * 5);
        assert_eq!(measurement.count, 25);
    }

    #[test]
    fn negative_coordinates_are_clipped_not_wrapped() {
        let mask = GrayImage::from_pixel(20, 20, Luma([FOREGROUND]));
        let slot = rect_slot(-5.0, -5.0, 4.0, 4.0);

        let measurement = measure_slot(&mask, &slot);

        assert_eq!(measurement.area, 25);
        assert_eq!(measurement.count, 25);
    }

    #[test]
    fn slot_outside_frame_counts_nothing() {
        let mask = GrayImage::from_pixel(20, 20, Luma([FOREGROUND]));
        let slot = rect_slot(30.0, 30.0, 40.0, 40.0);

        let measurement = measure_slot(&mask, &slot);

        assert_eq!(measurement, SlotMeasurement { count: 0, area: 1 });
    }

    #[test]
    fn far_out_vertices_match_a_frame_sized_slot() {
        let mask = GrayImage::from_fn(20, 20, |x, y| {
            if (x + y) % 3 == 0 {
                Luma([FOREGROUND])
            } else {
                Luma([0])
            }
        });
        let frame_sized = measure_slot(&mask, &rect_slot(0.0, 0.0, 20.0, 20.0));

        for extent in [4.0e9, 1.0e18, f64::MAX] {
            let huge = measure_slot(&mask, &rect_slot(0.0, 0.0, extent, extent));
            assert_eq!(huge, frame_sized, "extent {extent}");
        }
        let around = measure_slot(&mask, &rect_slot(-1.0e18, -1.0e18, 1.0e18, 1.0e18));
        assert_eq!(around, frame_sized);
        assert_eq!(frame_sized.area, 400);
    }

    #[test]
    fn far_out_triangle_fills_only_the_part_inside_the_frame() {
        let mask = GrayImage::from_pixel(20, 20, Luma([FOREGROUND]));
        // Hypotenuse x + y = 1e12 never crosses the frame.
        let triangle = ResolvedSlot {
            slot_id: None,
            slot_number: None,
            points: vec![
                PixelPoint::new(0.0, 0.0),
                PixelPoint::new(1.0e12, 0.0),
                PixelPoint::new(0.0, 1.0e12),
            ],
        };

        let measurement = measure_slot(&mask, &triangle);

        assert_eq!(measurement, SlotMeasurement { count: 400, area: 400 });
    }

    #[test]
    fn absolute_threshold_is_inclusive() -> Result<(), AppError> {
        let measurement = SlotMeasurement { count: 100, area: 400 };
        let absolute = |count| {
            PixelSignalStrategy::new(PixelSignalParams {
                absolute_pixel_threshold: Some(count),
                ratio_threshold: None,
                ..PixelSignalParams::default()
            })
        };

        assert!(absolute(100)?.decide(measurement));
        assert!(absolute(99)?.decide(measurement));
        assert!(!absolute(101)?.decide(measurement));
        Ok(())
    }

    #[test]
    fn ratio_threshold_is_strict() -> Result<(), AppError> {
        let measurement = SlotMeasurement { count: 100, area: 400 };

        assert!(!PixelSignalStrategy::new(ratio_params(0.25))?.decide(measurement));
        assert!(PixelSignalStrategy::new(ratio_params(0.24))?.decide(measurement));
        Ok(())
    }

    #[test]
    fn measured_full_mask_sits_on_both_boundaries() -> Result<(), AppError> {
        let mask = GrayImage::from_pixel(10, 10, Luma([FOREGROUND]));
        let measurement = measure_slot(&mask, &rect_slot(0.0, 0.0, 9.0, 9.0));
        assert_eq!(measurement, SlotMeasurement { count: 100, area: 100 });

        let absolute = PixelSignalStrategy::new(PixelSignalParams {
            absolute_pixel_threshold: Some(100),
            ratio_threshold: None,
            ..PixelSignalParams::default()
        })?;
        assert!(absolute.decide(measurement));
        assert!(!PixelSignalStrategy::new(ratio_params(1.0))?.decide(measurement));
        Ok(())
    }

    #[test]
    fn blur_kernel_is_three_taps_wide() {
        let kernel = gaussian_kernel_3(1.0);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!((kernel[0] - 0.274).abs() < 1e-3);
        assert_eq!(kernel[0], kernel[2]);

        let mut image = GrayImage::from_pixel(9, 9, Luma([200]));
        image.put_pixel(4, 4, Luma([0]));
        let blurred = gaussian_blur_3x3(&image, 1.0);

        let untouched = blurred.get_pixel(0, 0)[0];
        assert!(blurred.get_pixel(5, 5)[0] < untouched);
        assert_eq!(blurred.get_pixel(6, 4)[0], untouched);
        assert_eq!(blurred.get_pixel(4, 6)[0], untouched);
    }

    #[test]
    fn triangle_counts_fewer_pixels_than_its_rectangle() {
        let mask = GrayImage::from_pixel(40, 40, Luma([FOREGROUND]));
        let triangle = ResolvedSlot {
            slot_id: None,
            slot_number: None,
            points: vec![
                PixelPoint::new(0.0, 0.0),
                PixelPoint::new(30.0, 0.0),
                PixelPoint::new(0.0, 30.0),
            ],
        };

        let measurement = measure_slot(&mask, &triangle);

        assert_eq!(measurement.area, 31 * 31);
        assert!(measurement.count > 0);
        assert!(measurement.count < measurement.area);
    }

    #[test]
    fn wider_dilation_never_lowers_the_count() -> Result<(), AppError> {
        let frame = striped_frame(80, 80, (20, 20, 60, 60));
        let slots = vec![
            rect_slot(10.0, 10.0, 70.0, 70.0),
            rect_slot(15.0, 30.0, 40.0, 75.0),
            rect_slot(0.0, 0.0, 25.0, 25.0),
        ];

        let mut previous: Option<Vec<u64>> = None;
        for radius in 0..=3u8 {
            let strategy = PixelSignalStrategy::new(PixelSignalParams {
                dilation_radius: radius,
                ..ratio_params(0.3)
            })?;
            let counts: Vec<u64> = strategy
                .evaluate_slots(&frame, &slots)?
                .iter()
                .map(|verdict| verdict.pixel_count.unwrap_or(0))
                .collect();
            if let Some(prev) = &previous {
                for (before, after) in prev.iter().zip(&counts) {
                    assert!(after >= before, "count fell from {before} to {after}");
                }
            }
            previous = Some(counts);
        }
        Ok(())
    }
}

use crate::config::{StrategyKind, StrategySection};
use crate::detect::sidecar::SidecarDetector;
use crate::error::AppError;
use crate::frame::{Frame, FrameSource};
use crate::slots::{SlotId, SlotRecord, normalize_slot};
use crate::state::{AppState, OccupancySnapshot};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};
use tracing::{info, warn};

pub mod model;
pub mod overlap;
pub mod signal;

use model::{OccupancyStrategy, SlotOccupancyResult};
use overlap::DetectionOverlapStrategy;
use signal::PixelSignalStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OccupancySummary {
    pub total: usize,
    pub occupied: usize,
    pub free: usize,
    pub occupancy_rate: f64,
}

impl OccupancySummary {
    pub fn from_results(results: &[SlotOccupancyResult]) -> Self {
        let total = results.len();
        let occupied = results
            .iter()
            .filter(|result| result.status.is_occupied())
            .count();
        let occupancy_rate = if total == 0 {
            0.0
        } else {
            occupied as f64 / total as f64
        };
        Self {
            total,
            occupied,
            free: total - occupied,
            occupancy_rate,
        }
    }
}

/// A slot left out of a pass because its coordinates could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSlot {
    pub slot_id: Option<SlotId>,
    pub slot_number: Option<u32>,
    pub reason: String,
}

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub results: Vec<SlotOccupancyResult>,
    pub summary: OccupancySummary,
    pub skipped: Vec<SkippedSlot>,
}

/// Evaluate every slot against one frame with the given strategy.
///
/// Slots that fail normalization are reported in `skipped` and do not count
/// toward `summary.total`. Results keep the order of `slots`.
pub fn evaluate(
    frame: &Frame,
    slots: &[SlotRecord],
    strategy: &dyn OccupancyStrategy,
) -> Result<Evaluation, AppError> {
    let dimensions = frame.dimensions();
    let mut resolved = Vec::with_capacity(slots.len());
    let mut skipped = Vec::new();

    for record in slots {
        match normalize_slot(record, dimensions) {
            Ok(slot) => resolved.push(slot),
            Err(reason) => {
                warn!(slot = %record.label(), reason = %reason, "Skipping malformed slot");
                skipped.push(SkippedSlot {
                    slot_id: record.slot_id.clone(),
                    slot_number: record.slot_number,
                    reason: reason.to_string(),
                });
            }
        }
    }

    let verdicts = if resolved.is_empty() {
        Vec::new()
    } else {
        strategy.evaluate_slots(frame, &resolved)?
    };
    if verdicts.len() != resolved.len() {
        return Err(AppError::VerdictCount {
            expected: resolved.len(),
            actual: verdicts.len(),
        });
    }

    let method = strategy.method();
    let results: Vec<SlotOccupancyResult> = resolved
        .into_iter()
        .zip(verdicts)
        .map(|(slot, verdict)| SlotOccupancyResult::new(slot, verdict, method))
        .collect();
    let summary = OccupancySummary::from_results(&results);

    info!(
        method = ?method,
        total = summary.total,
        occupied = summary.occupied,
        free = summary.free,
        skipped = skipped.len(),
        "Occupancy pass complete"
    );

    Ok(Evaluation {
        results,
        summary,
        skipped,
    })
}

// Strategy factory
pub fn create_strategy(section: &StrategySection) -> Result<Box<dyn OccupancyStrategy>, AppError> {
    match section.kind {
        StrategyKind::PixelSignal => {
            let params = section.pixel_signal.clone().unwrap_or_default();
            Ok(Box::new(PixelSignalStrategy::new(params)?))
        }
        StrategyKind::DetectionOverlap => {
            let overlap = section.detection_overlap.as_ref().ok_or_else(|| {
                AppError::InvalidStrategy(
                    "detection_overlap requires a [strategy.detection_overlap] section"
                        .to_string(),
                )
            })?;
            let detector = SidecarDetector::open(&overlap.detections_path)?;
            info!(
                path = %detector.path().display(),
                "Detection sidecar attached"
            );
            Ok(Box::new(DetectionOverlapStrategy::new(
                Box::new(detector),
                overlap.params.clone(),
            )?))
        }
    }
}

/// One refresh pass: read a frame, evaluate the stored slots, publish the
/// snapshot. A failed pass is recorded and the previous snapshot kept.
pub fn run_refresh_cycle(
    state: &Arc<RwLock<AppState>>,
    source: &mut dyn FrameSource,
    strategy: &dyn OccupancyStrategy,
) -> Result<OccupancySnapshot, AppError> {
    let slots = {
        let guard = state.read().map_err(|_| AppError::StateLock)?;
        guard.slots().to_vec()
    };

    let outcome = source
        .next_frame()
        .and_then(|frame| evaluate(&frame, &slots, strategy));

    let mut guard = state.write().map_err(|_| AppError::StateLock)?;
    match outcome {
        Ok(evaluation) => {
            let snapshot = OccupancySnapshot {
                evaluation,
                timestamp: SystemTime::now(),
            };
            guard.set_snapshot(snapshot.clone());
            Ok(snapshot)
        }
        Err(err) => {
            guard.record_failure(err.to_string(), SystemTime::now());
            Err(err)
        }
    }
}

pub fn spawn_refresh_thread<S>(
    mut source: S,
    state: Arc<RwLock<AppState>>,
    interval: Duration,
    stop: Arc<AtomicBool>,
    strategy: Arc<dyn OccupancyStrategy>,
) -> std::thread::JoinHandle<()>
where
    S: FrameSource + Send + 'static,
{
    std::thread::spawn(move || {
        let slot_count = state.read().map(|guard| guard.slots().len()).unwrap_or(0);
        if slot_count == 0 {
            warn!("Refresh thread started with no slots configured");
        }

        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            if let Err(err) = run_refresh_cycle(&state, &mut source, strategy.as_ref()) {
                warn!(error = %err, "Occupancy refresh failed, keeping previous snapshot");
            }

            sleep_with_stop(interval, &stop, cycle_start);
        }
    })
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(100);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(step);
        slept += step;
    }
}

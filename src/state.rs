use crate::occupancy::Evaluation;
use crate::slots::SlotRecord;
use std::time::SystemTime;
use tokio::sync::watch;

/// Latest successful evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancySnapshot {
    pub evaluation: Evaluation,
    pub timestamp: SystemTime,
}

/// Most recent pass that aborted, cleared by the next successful one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassFailure {
    pub message: String,
    pub timestamp: SystemTime,
}

#[derive(Debug)]
pub struct AppState {
    slots: Vec<SlotRecord>,
    slots_tx: watch::Sender<Vec<SlotRecord>>,
    snapshot: Option<OccupancySnapshot>,
    snapshot_tx: watch::Sender<Option<OccupancySnapshot>>,
    last_failure: Option<PassFailure>,
}

impl AppState {
    pub fn new() -> Self {
        let (slots_tx, _slots_rx) = watch::channel(Vec::new());
        let (snapshot_tx, _snapshot_rx) = watch::channel(None);
        Self {
            slots: Vec::new(),
            slots_tx,
            snapshot: None,
            snapshot_tx,
            last_failure: None,
        }
    }

    pub fn slots(&self) -> &[SlotRecord] {
        &self.slots
    }

    pub fn subscribe_slots(&self) -> watch::Receiver<Vec<SlotRecord>> {
        self.slots_tx.subscribe()
    }

    /// Replace the whole slot set; slots are never edited in place.
    pub fn set_slots(&mut self, slots: Vec<SlotRecord>) {
        self.slots = slots.clone();
        // Stored even when nobody is subscribed.
        self.slots_tx.send_replace(slots);
    }

    pub fn snapshot(&self) -> Option<&OccupancySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<OccupancySnapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn set_snapshot(&mut self, snapshot: OccupancySnapshot) {
        self.snapshot = Some(snapshot.clone());
        self.last_failure = None;
        self.snapshot_tx.send_replace(Some(snapshot));
    }

    pub fn last_failure(&self) -> Option<&PassFailure> {
        self.last_failure.as_ref()
    }

    pub fn record_failure(&mut self, message: String, timestamp: SystemTime) {
        self.last_failure = Some(PassFailure { message, timestamp });
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

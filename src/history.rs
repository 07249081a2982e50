// Per-check history: the previous cycle's snapshot set and when it was taken

use crate::models::DeviceCounterSnapshot;
use std::collections::HashMap;

/// A complete previous sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Baseline {
    pub timestamp_ms: i64,
    pub snapshots: HashMap<String, DeviceCounterSnapshot>,
}

/// Owned by exactly one check. `None` until the first cycle completes.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    baseline: Option<Baseline>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cold(&self) -> bool {
        self.baseline.is_none()
    }

    pub fn previous_timestamp_ms(&self) -> Option<i64> {
        self.baseline.as_ref().map(|b| b.timestamp_ms)
    }

    pub fn get(&self, device_name: &str) -> Option<&DeviceCounterSnapshot> {
        self.baseline.as_ref()?.snapshots.get(device_name)
    }

    pub fn len(&self) -> usize {
        self.baseline.as_ref().map_or(0, |b| b.snapshots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the whole baseline; devices missing from `snapshots` are forgotten.
    pub fn replace_all(
        &mut self,
        snapshots: HashMap<String, DeviceCounterSnapshot>,
        timestamp_ms: i64,
    ) {
        self.baseline = Some(Baseline {
            timestamp_ms,
            snapshots,
        });
    }
}

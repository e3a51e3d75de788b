use crate::state::UpdateOutcome;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared by the ingestion and scheduling loops
#[derive(Clone, Default)]
pub struct PipelineMetrics {
    /// Updates that changed the store (insert, update, exit)
    updates_applied: Arc<AtomicU64>,
    updates_stale: Arc<AtomicU64>,
    updates_ignored: Arc<AtomicU64>,
    /// Undecodable or invalid payloads
    updates_rejected: Arc<AtomicU64>,

    schedules_published: Arc<AtomicU64>,
    publish_failures: Arc<AtomicU64>,
    /// Cycles that took longer than the scheduling interval
    cycle_overruns: Arc<AtomicU64>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_update(&self, outcome: UpdateOutcome) {
        let counter = match outcome {
            UpdateOutcome::Inserted | UpdateOutcome::Updated | UpdateOutcome::Removed => {
                &self.updates_applied
            }
            UpdateOutcome::Stale => &self.updates_stale,
            UpdateOutcome::Ignored => &self.updates_ignored,
            UpdateOutcome::Rejected => &self.updates_rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.schedules_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overrun(&self) {
        self.cycle_overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_schedules_published(&self) -> u64 {
        self.schedules_published.load(Ordering::Relaxed)
    }

    /// Get snapshot of all metrics
    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            updates_stale: self.updates_stale.load(Ordering::Relaxed),
            updates_ignored: self.updates_ignored.load(Ordering::Relaxed),
            updates_rejected: self.updates_rejected.load(Ordering::Relaxed),
            schedules_published: self.schedules_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            cycle_overruns: self.cycle_overruns.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub updates_applied: u64,
    pub updates_stale: u64,
    pub updates_ignored: u64,
    pub updates_rejected: u64,
    pub schedules_published: u64,
    pub publish_failures: u64,
    pub cycle_overruns: u64,
}

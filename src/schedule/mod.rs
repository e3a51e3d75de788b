// Intersection schedule and the all-stop scheduling algorithm

use crate::state::VehicleStatus;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod log;
mod scheduler;

pub use log::{ScheduleLogConfig, ScheduleLogger};
pub use scheduler::{clearance_ms, schedule_vehicles, AllStopScheduler};


/// Wire format version of the published schedule
pub const SCHEDULE_VERSION: u32 = 1;

/// One vehicle's slot in the schedule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub vehicle_id: String,

    /// Entry lane the vehicle departs from
    pub lane_id: i32,

    pub status: VehicleStatus,

    /// Actual or estimated stop time at the stop line (epoch ms)
    pub stop_time: i64,

    /// Assigned time to enter the intersection (epoch ms)
    pub departure_time: i64,

    /// Time the vehicle is expected to have cleared the conflict area (epoch ms)
    pub clearance_time: i64,

    /// Position in the departure sequence, starting at 0
    pub rank: usize,

    /// Vehicle may enter the intersection now
    pub access: bool,
}

/// Output of one scheduling cycle.
///
/// Immutable once built; an empty entry list means no active vehicles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionSchedule {
    pub version: u32,

    /// Snapshot time the schedule was computed for (epoch ms)
    pub timestamp: i64,

    /// Entries in rank order
    pub entries: Vec<ScheduleEntry>,
}

impl IntersectionSchedule {
    pub fn empty(timestamp: i64) -> Self {
        Self {
            version: SCHEDULE_VERSION,
            timestamp,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, vehicle_id: &str) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| e.vehicle_id == vehicle_id)
    }

    /// Serialize for publishing
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize intersection schedule")
    }

    /// One CSV line per entry:
    /// `timestamp,vehicle_id,lane_id,status,stop_time,departure_time,clearance_time,rank,access`
    pub fn to_csv_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| {
                format!(
                    "{},{},{},{},{},{},{},{},{}",
                    self.timestamp,
                    e.vehicle_id,
                    e.lane_id,
                    e.status.as_str(),
                    e.stop_time,
                    e.departure_time,
                    e.clearance_time,
                    e.rank,
                    e.access
                )
            })
            .collect()
    }
}

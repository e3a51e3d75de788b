//! Static intersection geometry.
//!
//! Loaded once at startup and shared read-only (behind `Arc`) by the
//! scheduling loop for the lifetime of the process.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

mod client;
pub mod config;

pub use client::{load_intersection, IntersectionClient};
pub use config::IntersectionConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneKind {
    /// Approach lane ending at a stop line
    Entry,
    /// Path through the intersection box
    Link,
    /// Lane leaving the intersection
    Departure,
}

/// One lane of the intersection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub id: i32,

    pub kind: LaneKind,

    /// Distance from the stop line until the conflict area is cleared (m)
    pub crossing_length: f64,

    /// Speed limit through the intersection (m/s)
    pub speed_limit: f64,

    /// Lanes whose vehicles cannot be in the box at the same time as ours
    #[serde(default)]
    pub conflicts: BTreeSet<i32>,
}

/// Geometry document as served by the intersection model endpoint
#[derive(Debug, Deserialize)]
struct IntersectionDocument {
    id: i32,
    name: String,
    lanes: Vec<Lane>,
}

/// Immutable intersection description
#[derive(Clone, Debug, PartialEq)]
pub struct IntersectionModel {
    id: i32,
    name: String,
    lanes: BTreeMap<i32, Lane>,
}

impl IntersectionModel {
    /// Build and validate a model.
    ///
    /// Conflicts are made symmetric, and every entry lane conflicts with itself
    /// so that one approach releases a single vehicle at a time.
    pub fn new(id: i32, name: impl Into<String>, lanes: Vec<Lane>) -> Result<Self> {
        let mut by_id = BTreeMap::new();
        for lane in lanes {
            if !(lane.crossing_length.is_finite() && lane.crossing_length > 0.0) {
                bail!("lane {} has invalid crossing_length {}", lane.id, lane.crossing_length);
            }
            if !(lane.speed_limit.is_finite() && lane.speed_limit > 0.0) {
                bail!("lane {} has invalid speed_limit {}", lane.id, lane.speed_limit);
            }
            let lane_id = lane.id;
            if by_id.insert(lane_id, lane).is_some() {
                bail!("duplicate lane id {}", lane_id);
            }
        }

        let mut pairs = Vec::new();
        for lane in by_id.values() {
            for other in &lane.conflicts {
                if !by_id.contains_key(other) {
                    bail!("lane {} lists unknown conflicting lane {}", lane.id, other);
                }
                pairs.push((*other, lane.id));
            }
            if lane.kind == LaneKind::Entry {
                pairs.push((lane.id, lane.id));
            }
        }
        for (lane_id, other) in pairs {
            if let Some(lane) = by_id.get_mut(&lane_id) {
                lane.conflicts.insert(other);
            }
        }

        Ok(Self {
            id,
            name: name.into(),
            lanes: by_id,
        })
    }

    /// Parse a JSON geometry document
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let doc: IntersectionDocument =
            serde_json::from_slice(bytes).context("Failed to parse intersection geometry JSON")?;
        Self::new(doc.id, doc.name, doc.lanes)
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lane(&self, lane_id: i32) -> Option<&Lane> {
        self.lanes.get(&lane_id)
    }

    /// Lane by id, only if it is an entry lane
    pub fn entry_lane(&self, lane_id: i32) -> Option<&Lane> {
        self.lane(lane_id).filter(|l| l.kind == LaneKind::Entry)
    }

    pub fn entry_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values().filter(|l| l.kind == LaneKind::Entry)
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// True when vehicles from lanes `a` and `b` may not occupy the box together
    pub fn conflicts(&self, a: i32, b: i32) -> bool {
        self.lanes
            .get(&a)
            .map(|lane| lane.conflicts.contains(&b))
            .unwrap_or(false)
    }
}

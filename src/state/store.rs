use crate::state::processor::{StatusIntentProcessor, Transition};
use crate::state::vehicle::{Vehicle, VehicleSnapshot};
use crate::status::StatusIntent;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of applying one inbound payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Inserted,
    Updated,
    Removed,
    /// Timestamp not newer than the stored record; nothing changed
    Stale,
    /// Valid payload that did not affect state (e.g. exit of an unknown vehicle)
    Ignored,
    /// Payload failed to decode or validate, or is stamped too far ahead
    Rejected,
}

/// Vehicle store shared between the ingestion and scheduling loops.
///
/// Every update is applied under the lock of the shard holding that vehicle,
/// so a snapshot never sees a half-applied record.
pub struct VehicleStore {
    /// Lock-free concurrent map: vehicle id -> vehicle
    pub(crate) vehicles: DashMap<String, Vehicle>,

    /// Exit timestamps of recently removed vehicles, so late out-of-order
    /// updates cannot bring them back
    exited: DashMap<String, i64>,

    processor: Arc<dyn StatusIntentProcessor>,
}

impl VehicleStore {
    pub fn new(processor: Arc<dyn StatusIntentProcessor>) -> Self {
        info!(processor = processor.name(), timeout_ms = processor.timeout_ms(), "Vehicle store configured");

        Self {
            vehicles: DashMap::new(),
            exited: DashMap::new(),
            processor,
        }
    }

    /// Decode a raw payload and apply it.
    ///
    /// Never fails: malformed payloads are logged and reported as `Rejected`.
    pub fn apply_update(&self, payload: &[u8]) -> UpdateOutcome {
        match self.processor.decode(payload) {
            Ok(msg) => self.apply(&msg),
            Err(e) => {
                warn!(error = %e, bytes = payload.len(), "Discarding status intent");
                UpdateOutcome::Rejected
            }
        }
    }

    /// Apply an already decoded update received now
    pub fn apply(&self, msg: &StatusIntent) -> UpdateOutcome {
        self.apply_at(msg, Utc::now().timestamp_millis())
    }

    /// Apply an already decoded update received at `received_at` (epoch ms).
    ///
    /// Updates stamped too far in the future are rejected: they would never
    /// expire and would make every genuine update for the vehicle look stale.
    pub fn apply_at(&self, msg: &StatusIntent, received_at: i64) -> UpdateOutcome {
        let skew = self.processor.max_clock_skew_ms();
        if msg.timestamp > received_at.saturating_add(skew) {
            warn!(
                vehicle_id = %msg.vehicle_id,
                timestamp = msg.timestamp,
                received_at = received_at,
                max_skew_ms = skew,
                "Discarding status intent from the future"
            );
            return UpdateOutcome::Rejected;
        }

        match self.vehicles.entry(msg.vehicle_id.clone()) {
            Entry::Occupied(mut entry) => {
                if msg.timestamp <= entry.get().last_updated {
                    debug!(
                        vehicle_id = %msg.vehicle_id,
                        timestamp = msg.timestamp,
                        stored = entry.get().last_updated,
                        "Skipping out-of-order update"
                    );
                    return UpdateOutcome::Stale;
                }

                match self.processor.transition(Some(entry.get()), msg) {
                    Transition::Upsert(vehicle) => {
                        if vehicle.status != entry.get().status {
                            info!(
                                vehicle_id = %vehicle.id,
                                from = entry.get().status.as_str(),
                                to = vehicle.status.as_str(),
                                "Vehicle status changed"
                            );
                        }
                        entry.insert(vehicle);
                        UpdateOutcome::Updated
                    }
                    Transition::Remove => {
                        entry.remove();
                        self.exited.insert(msg.vehicle_id.clone(), msg.timestamp);
                        info!(vehicle_id = %msg.vehicle_id, "Vehicle exited intersection");
                        UpdateOutcome::Removed
                    }
                    Transition::Ignore => UpdateOutcome::Ignored,
                }
            }
            Entry::Vacant(entry) => {
                if let Some(exited_at) = self.exited.get(&msg.vehicle_id).map(|t| *t) {
                    if msg.timestamp <= exited_at {
                        debug!(vehicle_id = %msg.vehicle_id, "Skipping update older than exit");
                        return UpdateOutcome::Stale;
                    }
                    self.exited.remove(&msg.vehicle_id);
                }

                match self.processor.transition(None, msg) {
                    Transition::Upsert(vehicle) => {
                        info!(
                            vehicle_id = %vehicle.id,
                            lane_id = vehicle.lane_id,
                            status = vehicle.status.as_str(),
                            "Tracking new vehicle"
                        );
                        entry.insert(vehicle);
                        UpdateOutcome::Inserted
                    }
                    Transition::Remove | Transition::Ignore => UpdateOutcome::Ignored,
                }
            }
        }
    }

    /// Get vehicle by ID
    pub fn get_vehicle(&self, vehicle_id: &str) -> Option<Vehicle> {
        self.vehicles.get(vehicle_id).map(|v| v.clone())
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    /// Expire silent vehicles, then copy the rest.
    ///
    /// A vehicle whose last update is more than the processor timeout before
    /// `now` is removed and will not appear in this or any later snapshot
    /// unless it reports again.
    pub fn snapshot_at(&self, now: i64) -> VehicleSnapshot {
        let timeout = self.processor.timeout_ms();

        self.vehicles.retain(|id, vehicle| {
            let fresh = now.saturating_sub(vehicle.last_updated) <= timeout;
            if !fresh {
                info!(
                    vehicle_id = %id,
                    last_updated = vehicle.last_updated,
                    "Expiring vehicle with no recent update"
                );
            }
            fresh
        });
        self.exited.retain(|_, exited_at| now.saturating_sub(*exited_at) <= timeout);

        let vehicles = self.vehicles.iter().map(|v| v.value().clone()).collect();
        VehicleSnapshot::new(now, vehicles)
    }
}

use crate::state::vehicle::{Vehicle, VehicleStatus};
use crate::status::{Intent, StatusError, StatusIntent};
use tracing::warn;

/// Acceleration assumed when a vehicle does not report one (m/s²)
pub const DEFAULT_MAX_ACCEL: f64 = 2.0;

/// How far ahead of the receive time a vehicle clock may run (ms)
pub const DEFAULT_MAX_CLOCK_SKEW_MS: i64 = 5_000;

/// What the store should do with a decoded update
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// Insert or replace the vehicle record
    Upsert(Vehicle),
    /// Drop the vehicle record (it has cleared the intersection)
    Remove,
    /// Nothing to do
    Ignore,
}

/// Interprets inbound status/intent payloads for the vehicle store.
///
/// The store owns concurrency and the timestamp ordering; implementations
/// decide how a payload is decoded and how it moves a vehicle through its
/// lifecycle. Selected once at startup.
pub trait StatusIntentProcessor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Decode and validate a raw payload
    fn decode(&self, payload: &[u8]) -> Result<StatusIntent, StatusError> {
        StatusIntent::from_slice(payload)
    }

    /// Compute the new record for a vehicle given its current record (if any).
    ///
    /// Only called with updates strictly newer than `current`.
    fn transition(&self, current: Option<&Vehicle>, msg: &StatusIntent) -> Transition;

    /// Staleness timeout (ms) after which a silent vehicle is dropped
    fn timeout_ms(&self) -> i64;

    /// Updates stamped further than this (ms) past the receive time are rejected
    fn max_clock_skew_ms(&self) -> i64 {
        DEFAULT_MAX_CLOCK_SKEW_MS
    }
}

/// Processor for all-way stop intersections.
///
/// A vehicle counts as stopped once it is within `stop_distance` of the stop
/// line at no more than `stop_speed`.
#[derive(Clone, Debug)]
pub struct AllStopProcessor {
    stop_distance: f64,
    stop_speed: f64,
    timeout_ms: i64,
    max_clock_skew_ms: i64,
}

impl AllStopProcessor {
    pub fn new(stop_distance: f64, stop_speed: f64, timeout_ms: i64) -> Self {
        Self {
            stop_distance,
            stop_speed,
            timeout_ms,
            max_clock_skew_ms: DEFAULT_MAX_CLOCK_SKEW_MS,
        }
    }

    pub fn with_max_clock_skew(mut self, max_clock_skew_ms: i64) -> Self {
        self.max_clock_skew_ms = max_clock_skew_ms;
        self
    }

    fn is_stopped(&self, msg: &StatusIntent) -> bool {
        msg.distance <= self.stop_distance && msg.speed <= self.stop_speed
    }
}

impl StatusIntentProcessor for AllStopProcessor {
    fn name(&self) -> &str {
        "all_stop"
    }

    fn transition(&self, current: Option<&Vehicle>, msg: &StatusIntent) -> Transition {
        let reported = match msg.intent {
            Intent::Exited => {
                return match current {
                    Some(_) => Transition::Remove,
                    None => Transition::Ignore,
                };
            }
            Intent::Departing => VehicleStatus::Departing,
            Intent::Approaching if self.is_stopped(msg) => VehicleStatus::Stopped,
            Intent::Approaching => VehicleStatus::Approaching,
        };

        let prior = current.map(|v| v.status).unwrap_or(VehicleStatus::Approaching);
        let status = prior.max(reported);

        if prior == VehicleStatus::Approaching && status == VehicleStatus::Departing {
            warn!(
                vehicle_id = %msg.vehicle_id,
                lane_id = msg.lane_id,
                "Vehicle entered intersection without a recorded stop"
            );
        }

        let stopped_at = current.and_then(|v| v.stopped_at).or_else(|| {
            (status >= VehicleStatus::Stopped).then_some(msg.timestamp)
        });
        let departed_at = current.and_then(|v| v.departed_at).or_else(|| {
            (status == VehicleStatus::Departing).then_some(msg.timestamp)
        });

        // A departing vehicle stays scheduled on the lane it entered from
        let lane_id = match (current, status) {
            (Some(v), VehicleStatus::Departing) if v.status == VehicleStatus::Departing => v.lane_id,
            _ => msg.lane_id,
        };

        Transition::Upsert(Vehicle {
            id: msg.vehicle_id.clone(),
            lane_id,
            distance: msg.distance,
            speed: msg.speed,
            max_accel: msg
                .max_accel
                .filter(|a| *a > 0.0)
                .unwrap_or(DEFAULT_MAX_ACCEL),
            status,
            last_updated: msg.timestamp,
            stopped_at,
            departed_at,
        })
    }

    fn timeout_ms(&self) -> i64 {
        self.timeout_ms
    }

    fn max_clock_skew_ms(&self) -> i64 {
        self.max_clock_skew_ms
    }
}

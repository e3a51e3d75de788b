use crate::intersection::{IntersectionModel, Lane};
use crate::schedule::{IntersectionSchedule, ScheduleEntry};
use crate::state::{Vehicle, VehicleSnapshot, VehicleStatus};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Floor for the approach speed used in stop-time estimates (m/s)
const MIN_APPROACH_SPEED: f64 = 0.5;

/// All-stop scheduler bound to one intersection.
///
/// Holds no mutable state; `schedule` is a pure function of the snapshot.
#[derive(Clone, Debug)]
pub struct AllStopScheduler {
    model: Arc<IntersectionModel>,
    flexibility_limit: usize,
}

impl AllStopScheduler {
    pub fn new(model: Arc<IntersectionModel>, flexibility_limit: usize) -> Self {
        Self {
            model,
            flexibility_limit,
        }
    }

    pub fn flexibility_limit(&self) -> usize {
        self.flexibility_limit
    }

    pub fn schedule(&self, snapshot: &VehicleSnapshot) -> IntersectionSchedule {
        schedule_vehicles(snapshot, &self.model, self.flexibility_limit)
    }
}

/// Time (ms) to cross `lane` from rest, accelerating at `max_accel` up to the
/// lane speed limit.
pub fn clearance_ms(lane: &Lane, max_accel: f64) -> i64 {
    let accel = max_accel.max(f64::EPSILON);
    let top_speed = lane.speed_limit;
    let accel_distance = top_speed * top_speed / (2.0 * accel);

    let secs = if accel_distance >= lane.crossing_length {
        (2.0 * lane.crossing_length / accel).sqrt()
    } else {
        top_speed / accel + (lane.crossing_length - accel_distance) / top_speed
    };

    (secs * 1000.0).ceil() as i64
}

/// Vehicle prepared for scheduling
struct Pending<'a> {
    vehicle: &'a Vehicle,
    lane: &'a Lane,
    /// Actual or estimated stop-line arrival (ms)
    arrival: i64,
    clearance: i64,
}

impl Pending<'_> {
    fn is_departing(&self) -> bool {
        self.vehicle.status == VehicleStatus::Departing
    }
}

/// Occupied window of an already placed vehicle
#[derive(Clone, Copy)]
struct Window {
    lane_id: i32,
    clearance_time: i64,
}

/// Estimated stop-line arrival for a vehicle that has not stopped yet,
/// assuming uniform deceleration to rest at the line.
fn estimate_stop_time(vehicle: &Vehicle, now: i64) -> i64 {
    let speed = vehicle.speed.max(MIN_APPROACH_SPEED);
    let secs = 2.0 * vehicle.distance / speed;
    // Float-to-int casts saturate; keep the sum from overflowing too
    now.saturating_add((secs * 1000.0).round() as i64)
}

/// Order of vehicles inside one lane queue: front of the queue first
fn queue_order(a: &Vehicle, b: &Vehicle) -> std::cmp::Ordering {
    b.status
        .cmp(&a.status)
        .then_with(|| match a.status {
            VehicleStatus::Departing => a.departed_at.cmp(&b.departed_at),
            _ => a.distance.total_cmp(&b.distance),
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// Resolve lanes, drop anomalies, and compute arrivals.
///
/// Arrivals are made strictly increasing along each lane queue so a follower
/// never ranks ahead of its leader.
fn prepare<'a>(
    snapshot: &'a VehicleSnapshot,
    model: &'a IntersectionModel,
) -> Vec<Pending<'a>> {
    let now = snapshot.taken_at;
    let mut by_lane: BTreeMap<i32, Vec<&'a Vehicle>> = BTreeMap::new();

    for vehicle in &snapshot.vehicles {
        if model.entry_lane(vehicle.lane_id).is_none() {
            warn!(
                vehicle_id = %vehicle.id,
                lane_id = vehicle.lane_id,
                "Vehicle reports unknown entry lane, excluding from schedule"
            );
            continue;
        }
        by_lane.entry(vehicle.lane_id).or_default().push(vehicle);
    }

    let mut pending = Vec::with_capacity(snapshot.vehicles.len());
    for (lane_id, mut queue) in by_lane {
        let Some(lane) = model.entry_lane(lane_id) else {
            continue;
        };
        queue.sort_by(|a, b| queue_order(a, b));

        let mut previous: Option<i64> = None;
        for vehicle in queue {
            let mut arrival = match vehicle.status {
                VehicleStatus::Approaching => estimate_stop_time(vehicle, now),
                VehicleStatus::Stopped | VehicleStatus::Departing => {
                    vehicle.stopped_at.unwrap_or(vehicle.last_updated)
                }
            };
            if vehicle.status != VehicleStatus::Departing {
                if let Some(prev) = previous {
                    arrival = arrival.max(prev.saturating_add(1));
                }
                previous = Some(arrival);
            }

            pending.push(Pending {
                vehicle,
                lane,
                arrival,
                clearance: clearance_ms(lane, vehicle.max_accel),
            });
        }
    }

    // Strict FCFS: vehicles already in the box, then arrival, then id
    pending.sort_by(|a, b| {
        b.is_departing()
            .cmp(&a.is_departing())
            .then_with(|| a.arrival.cmp(&b.arrival))
            .then_with(|| a.vehicle.id.cmp(&b.vehicle.id))
    });
    pending
}

/// First time at or after `floor` when every placed window conflicting with
/// `lane_id` has cleared
fn clear_after(lane_id: i32, floor: i64, placed: &[Window], model: &IntersectionModel) -> i64 {
    placed
        .iter()
        .filter(|w| model.conflicts(w.lane_id, lane_id))
        .map(|w| w.clearance_time)
        .fold(floor, i64::max)
}

/// Earliest time `p` may enter given the windows placed so far
fn earliest_departure(
    p: &Pending<'_>,
    placed: &[Window],
    model: &IntersectionModel,
    now: i64,
) -> i64 {
    clear_after(p.lane.id, now.max(p.arrival), placed, model)
}

/// Summed waiting time when `first` is released before `second`
fn pair_wait(
    first: &Pending<'_>,
    second: &Pending<'_>,
    placed: &mut Vec<Window>,
    model: &IntersectionModel,
    now: i64,
) -> i64 {
    let first_departure = earliest_departure(first, placed, model, now);
    placed.push(Window {
        lane_id: first.lane.id,
        clearance_time: first_departure.saturating_add(first.clearance),
    });
    let second_departure = earliest_departure(second, placed, model, now);
    placed.pop();

    (first_departure - first.arrival).saturating_add(second_departure - second.arrival)
}

/// Compute the departure schedule for one snapshot.
///
/// Vehicles are released in first-come-first-served order, except that a
/// vehicle may be moved at most `flexibility_limit` positions when swapping
/// it with the current choice strictly lowers the pair's summed waiting
/// time. Vehicles in conflicting lanes get non-overlapping windows.
pub fn schedule_vehicles(
    snapshot: &VehicleSnapshot,
    model: &IntersectionModel,
    flexibility_limit: usize,
) -> IntersectionSchedule {
    let now = snapshot.taken_at;
    let mut schedule = IntersectionSchedule::empty(now);
    if snapshot.is_empty() {
        return schedule;
    }

    let pending = prepare(snapshot, model);
    let mut placed: Vec<Window> = Vec::with_capacity(pending.len());
    let mut done = vec![false; pending.len()];

    // Vehicles already in the box go first, in entry order. A later entrant
    // from a conflicting lane is held until the earlier one has cleared.
    let departing = pending.iter().take_while(|p| p.is_departing()).count();
    for (rank, p) in pending.iter().take(departing).enumerate() {
        let entered = p.vehicle.departed_at.unwrap_or(p.vehicle.last_updated);
        let departure_time = clear_after(p.lane.id, entered, &placed, model);
        if departure_time != entered {
            warn!(
                vehicle_id = %p.vehicle.id,
                lane_id = p.lane.id,
                entered = entered,
                departure_time = departure_time,
                "Vehicle entered a conflicting occupied box, shifting its window"
            );
        }
        let clearance_time = departure_time.saturating_add(p.clearance);
        placed.push(Window {
            lane_id: p.lane.id,
            clearance_time,
        });
        done[rank] = true;
        schedule.entries.push(ScheduleEntry {
            vehicle_id: p.vehicle.id.clone(),
            lane_id: p.lane.id,
            status: p.vehicle.status,
            stop_time: p.arrival,
            departure_time,
            clearance_time,
            rank,
            access: true,
        });
    }

    for rank in departing..pending.len() {
        let Some(head) = (0..pending.len()).find(|&i| !done[i]) else {
            break;
        };

        let mut choice = head;
        if rank - head < flexibility_limit {
            let window_end = (rank + flexibility_limit).min(pending.len() - 1);
            for candidate in (head + 1)..=window_end {
                if done[candidate] {
                    continue;
                }
                // Only the front of a lane queue can be released
                let blocked = (head..candidate).any(|i| {
                    !done[i] && pending[i].lane.id == pending[candidate].lane.id
                });
                if blocked {
                    continue;
                }

                let promoted = pair_wait(&pending[candidate], &pending[choice], &mut placed, model, now);
                let kept = pair_wait(&pending[choice], &pending[candidate], &mut placed, model, now);
                if promoted < kept {
                    choice = candidate;
                }
            }
        }

        if choice != head {
            debug!(
                vehicle_id = %pending[choice].vehicle.id,
                fcfs_rank = choice,
                rank = rank,
                "Promoting vehicle ahead of FCFS order"
            );
        }

        let p = &pending[choice];
        let departure_time = earliest_departure(p, &placed, model, now);
        let clearance_time = departure_time.saturating_add(p.clearance);
        placed.push(Window {
            lane_id: p.lane.id,
            clearance_time,
        });
        done[choice] = true;

        schedule.entries.push(ScheduleEntry {
            vehicle_id: p.vehicle.id.clone(),
            lane_id: p.lane.id,
            status: p.vehicle.status,
            stop_time: p.arrival,
            departure_time,
            clearance_time,
            rank,
            access: p.vehicle.status == VehicleStatus::Stopped && departure_time <= now,
        });
    }

    schedule
}

use serde::{Deserialize, Serialize};

/// Lifecycle of a vehicle at an all-stop intersection.
///
/// Ordered: a vehicle only ever moves forward through these states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Approaching,
    Stopped,
    Departing,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Approaching => "approaching",
            VehicleStatus::Stopped => "stopped",
            VehicleStatus::Departing => "departing",
        }
    }
}

/// Vehicle is the tracked state of one physical vehicle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Unique vehicle identifier
    pub id: String,

    /// Entry lane the vehicle is queued on
    pub lane_id: i32,

    /// Distance to the stop line (m)
    pub distance: f64,

    /// Speed (m/s)
    pub speed: f64,

    /// Maximum acceleration used for clearance estimates (m/s²)
    pub max_accel: f64,

    pub status: VehicleStatus,

    /// Timestamp of the last applied update (epoch ms)
    pub last_updated: i64,

    /// When the vehicle first came to a stop at the stop line (epoch ms)
    pub stopped_at: Option<i64>,

    /// When the vehicle first reported entering the intersection (epoch ms)
    pub departed_at: Option<i64>,
}

/// Point-in-time copy of every tracked vehicle
#[derive(Clone, Debug, PartialEq)]
pub struct VehicleSnapshot {
    /// Service time the snapshot was taken (epoch ms)
    pub taken_at: i64,

    /// Vehicles sorted by id
    pub vehicles: Vec<Vehicle>,
}

impl VehicleSnapshot {
    pub fn new(taken_at: i64, mut vehicles: Vec<Vehicle>) -> Self {
        vehicles.sort_by(|a, b| a.id.cmp(&b.id));
        Self { taken_at, vehicles }
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

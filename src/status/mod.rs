use serde::{Deserialize, Serialize};

mod validation;
#[cfg(test)]
mod tests;

pub use validation::{validate, StatusError, MAX_ACCEL, MAX_DISTANCE, MAX_SPEED, SUPPORTED_VERSION};

/// Intent a vehicle reports alongside its kinematic status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Driving towards the stop line (or waiting at it)
    Approaching,
    /// Has entered the intersection box
    Departing,
    /// Has left the intersection on a departure lane
    Exited,
}

/// StatusIntent is one inbound vehicle update.
///
/// Versioned JSON envelope; everything the store needs to track a vehicle
/// travels in a single message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusIntent {
    /// Wire format version (currently 1)
    pub version: u32,

    /// Vehicle identifier (e.g., "DOT-45244")
    pub vehicle_id: String,

    /// Entry lane the vehicle is approaching or crossing from
    pub lane_id: i32,

    /// Distance to the stop line in meters
    pub distance: f64,

    /// Current speed in m/s
    pub speed: f64,

    /// Maximum acceleration in m/s² (optional, processor default applies)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_accel: Option<f64>,

    pub intent: Intent,

    /// Unix epoch milliseconds (vehicle time)
    pub timestamp: i64,
}

impl StatusIntent {
    /// Decodes and validates a raw payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, StatusError> {
        let msg: StatusIntent = serde_json::from_slice(payload)
            .map_err(|e| StatusError::Malformed(e.to_string()))?;
        validate(&msg)?;
        Ok(msg)
    }
}

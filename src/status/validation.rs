use super::StatusIntent;
use std::fmt;

/// Only wire version this service understands
pub const SUPPORTED_VERSION: u32 = 1;

/// Upper bounds on reported kinematics; anything above is a sensor fault
pub const MAX_DISTANCE: f64 = 10_000.0; // m
pub const MAX_SPEED: f64 = 100.0; // m/s
pub const MAX_ACCEL: f64 = 50.0; // m/s²

/// Validation errors for StatusIntent payloads
#[derive(Debug, Clone, PartialEq)]
pub enum StatusError {
    Malformed(String),
    UnsupportedVersion(u32),
    MissingVehicleId,
    InvalidTimestamp(i64),
    InvalidKinematics { field: &'static str, value: f64 },
    OutOfRange { field: &'static str, value: f64, max: f64 },
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusError::Malformed(e) => write!(f, "malformed status intent payload: {}", e),
            StatusError::UnsupportedVersion(v) => {
                write!(f, "unsupported status intent version {}, expected {}", v, SUPPORTED_VERSION)
            }
            StatusError::MissingVehicleId => write!(f, "vehicle_id is required"),
            StatusError::InvalidTimestamp(ts) => {
                write!(f, "timestamp must be positive, got {}", ts)
            }
            StatusError::InvalidKinematics { field, value } => {
                write!(f, "{} must be finite and non-negative, got {}", field, value)
            }
            StatusError::OutOfRange { field, value, max } => {
                write!(f, "{} must be at most {}, got {}", field, max, value)
            }
        }
    }
}

impl std::error::Error for StatusError {}

/// Validates a decoded StatusIntent.
///
/// Validation rules:
/// - version must equal SUPPORTED_VERSION
/// - vehicle_id must be non-empty (after trimming)
/// - timestamp must be positive (Unix epoch milliseconds)
/// - distance, speed and max_accel must be finite and non-negative
/// - distance, speed and max_accel must not exceed MAX_DISTANCE, MAX_SPEED, MAX_ACCEL
pub fn validate(msg: &StatusIntent) -> Result<(), StatusError> {
    if msg.version != SUPPORTED_VERSION {
        return Err(StatusError::UnsupportedVersion(msg.version));
    }
    if msg.vehicle_id.trim().is_empty() {
        return Err(StatusError::MissingVehicleId);
    }
    if msg.timestamp <= 0 {
        return Err(StatusError::InvalidTimestamp(msg.timestamp));
    }

    check_bounded("distance", msg.distance, MAX_DISTANCE)?;
    check_bounded("speed", msg.speed, MAX_SPEED)?;
    if let Some(accel) = msg.max_accel {
        check_bounded("max_accel", accel, MAX_ACCEL)?;
    }

    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), StatusError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(StatusError::InvalidKinematics { field, value })
    }
}

fn check_bounded(field: &'static str, value: f64, max: f64) -> Result<(), StatusError> {
    check_non_negative(field, value)?;
    if value > max {
        return Err(StatusError::OutOfRange { field, value, max });
    }
    Ok(())
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_check_non_negative() {
        assert!(check_non_negative("speed", 0.0).is_ok());
        assert!(check_non_negative("speed", 12.5).is_ok());
        assert!(check_non_negative("speed", -0.1).is_err());
        assert!(check_non_negative("speed", f64::NAN).is_err());
        assert!(check_non_negative("speed", f64::INFINITY).is_err());
    }

    #[test]
    fn test_check_bounded() {
        assert!(check_bounded("distance", MAX_DISTANCE, MAX_DISTANCE).is_ok());
        assert_eq!(
            check_bounded("distance", 1e300, MAX_DISTANCE),
            Err(StatusError::OutOfRange {
                field: "distance",
                value: 1e300,
                max: MAX_DISTANCE
            })
        );
        assert!(check_bounded("distance", -1.0, MAX_DISTANCE).is_err());
    }
}

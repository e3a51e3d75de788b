use super::*;
use serde_json::json;

fn payload(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

#[test]
fn test_valid_payload_decodes() {
    let raw = payload(json!({
        "version": 1,
        "vehicle_id": "DOT-45244",
        "lane_id": 5,
        "distance": 12.4,
        "speed": 3.1,
        "max_accel": 2.5,
        "intent": "approaching",
        "timestamp": 1700000000000i64
    }));

    let msg = StatusIntent::from_slice(&raw).unwrap();
    assert_eq!(msg.vehicle_id, "DOT-45244");
    assert_eq!(msg.lane_id, 5);
    assert_eq!(msg.intent, Intent::Approaching);
    assert_eq!(msg.max_accel, Some(2.5));
    assert_eq!(msg.timestamp, 1_700_000_000_000);
}

#[test]
fn test_max_accel_is_optional() {
    let raw = payload(json!({
        "version": 1,
        "vehicle_id": "DOT-1",
        "lane_id": 1,
        "distance": 0.0,
        "speed": 0.0,
        "intent": "departing",
        "timestamp": 1
    }));

    let msg = StatusIntent::from_slice(&raw).unwrap();
    assert_eq!(msg.max_accel, None);
    assert_eq!(msg.intent, Intent::Departing);
}

#[test]
fn test_not_json_is_malformed() {
    let result = StatusIntent::from_slice(b"\x00\x01garbage");
    assert!(matches!(result, Err(StatusError::Malformed(_))));
}

#[test]
fn test_missing_field_is_malformed() {
    let raw = payload(json!({
        "version": 1,
        "vehicle_id": "DOT-1",
        "distance": 1.0,
        "speed": 1.0,
        "intent": "approaching",
        "timestamp": 1
    }));

    assert!(matches!(
        StatusIntent::from_slice(&raw),
        Err(StatusError::Malformed(_))
    ));
}

#[test]
fn test_unknown_intent_is_malformed() {
    let raw = payload(json!({
        "version": 1,
        "vehicle_id": "DOT-1",
        "lane_id": 1,
        "distance": 1.0,
        "speed": 1.0,
        "intent": "parked",
        "timestamp": 1
    }));

    assert!(matches!(
        StatusIntent::from_slice(&raw),
        Err(StatusError::Malformed(_))
    ));
}

#[test]
fn test_unsupported_version_fails() {
    let raw = payload(json!({
        "version": 2,
        "vehicle_id": "DOT-1",
        "lane_id": 1,
        "distance": 1.0,
        "speed": 1.0,
        "intent": "approaching",
        "timestamp": 1
    }));

    assert_eq!(
        StatusIntent::from_slice(&raw).unwrap_err(),
        StatusError::UnsupportedVersion(2)
    );
}

#[test]
fn test_blank_vehicle_id_fails() {
    let raw = payload(json!({
        "version": 1,
        "vehicle_id": "  ",
        "lane_id": 1,
        "distance": 1.0,
        "speed": 1.0,
        "intent": "approaching",
        "timestamp": 1
    }));

    assert_eq!(
        StatusIntent::from_slice(&raw).unwrap_err(),
        StatusError::MissingVehicleId
    );
}

#[test]
fn test_invalid_timestamp_fails() {
    let raw = payload(json!({
        "version": 1,
        "vehicle_id": "DOT-1",
        "lane_id": 1,
        "distance": 1.0,
        "speed": 1.0,
        "intent": "approaching",
        "timestamp": 0
    }));

    assert_eq!(
        StatusIntent::from_slice(&raw).unwrap_err(),
        StatusError::InvalidTimestamp(0)
    );
}

#[test]
fn test_negative_speed_fails() {
    let raw = payload(json!({
        "version": 1,
        "vehicle_id": "DOT-1",
        "lane_id": 1,
        "distance": 1.0,
        "speed": -2.0,
        "intent": "approaching",
        "timestamp": 10
    }));

    match StatusIntent::from_slice(&raw).unwrap_err() {
        StatusError::InvalidKinematics { field, value } => {
            assert_eq!(field, "speed");
            assert_eq!(value, -2.0);
        }
        other => panic!("Expected InvalidKinematics, got {:?}", other),
    }
}

#[test]
fn test_error_messages() {
    assert_eq!(
        StatusError::MissingVehicleId.to_string(),
        "vehicle_id is required"
    );
    assert!(StatusError::UnsupportedVersion(7)
        .to_string()
        .contains("unsupported status intent version 7"));
}

#[test]
fn test_implausible_distance_fails() {
    let raw = payload(json!({
        "version": 1,
        "vehicle_id": "DOT-1",
        "lane_id": 1,
        "distance": 1e300,
        "speed": 0.0,
        "intent": "approaching",
        "timestamp": 1000
    }));

    match StatusIntent::from_slice(&raw).unwrap_err() {
        StatusError::OutOfRange { field, max, .. } => {
            assert_eq!(field, "distance");
            assert_eq!(max, MAX_DISTANCE);
        }
        other => panic!("Expected OutOfRange, got {:?}", other),
    }
}

#[test]
fn test_implausible_speed_and_accel_fail() {
    let too_fast = payload(json!({
        "version": 1,
        "vehicle_id": "DOT-1",
        "lane_id": 1,
        "distance": 10.0,
        "speed": MAX_SPEED + 1.0,
        "intent": "approaching",
        "timestamp": 1000
    }));
    assert!(StatusIntent::from_slice(&too_fast).is_err());

    let too_hard = payload(json!({
        "version": 1,
        "vehicle_id": "DOT-1",
        "lane_id": 1,
        "distance": 10.0,
        "speed": 5.0,
        "max_accel": 1e12,
        "intent": "approaching",
        "timestamp": 1000
    }));
    assert!(StatusIntent::from_slice(&too_hard).is_err());
}

//! Message decoder
//!
//! Turns the verbatim payload of one subscription message into a
//! [`RawUpdate`]. Pure: no logging, no state.
//!
//! Wire format, one JSON object per message:
//!
//! ```text
//! { "truckId"?: string, "id"?: string, "latitude": number, "longitude": number }
//! ```

use fleet_types::errors::DecodeError;
use serde_json::{Map, Value};

use crate::events::RawUpdate;

/// Decode one payload.
///
/// Fails with `Malformed` when the payload is not a JSON object and with
/// `MissingCoordinates` when either coordinate is absent, non-numeric or
/// non-finite. Identifier fields that are neither strings nor numbers are
/// treated as absent.
pub fn decode(raw: impl AsRef<[u8]>) -> Result<RawUpdate, DecodeError> {
    let value: Value =
        serde_json::from_slice(raw.as_ref()).map_err(|e| DecodeError::Malformed {
            reason: e.to_string(),
        })?;

    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(DecodeError::Malformed {
                reason: format!("expected a JSON object, got {}", json_type(&other)),
            })
        }
    };

    let latitude = coordinate(&fields, "latitude")?;
    let longitude = coordinate(&fields, "longitude")?;

    Ok(RawUpdate {
        truck_id: identifier(&fields, "truckId"),
        id: identifier(&fields, "id"),
        latitude,
        longitude,
    })
}

fn coordinate(fields: &Map<String, Value>, field: &'static str) -> Result<f64, DecodeError> {
    fields
        .get(field)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or(DecodeError::MissingCoordinates { field })
}

fn identifier(fields: &Map<String, Value>, field: &str) -> Option<String> {
    match fields.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_truck_update() {
        let update =
            decode(r#"{"truckId": "TRUCK-0001", "latitude": -33.924900, "longitude": 18.424100}"#)
                .unwrap();
        assert_eq!(update.truck_id.as_deref(), Some("TRUCK-0001"));
        assert_eq!(update.id, None);
        assert_eq!(update.latitude, -33.9249);
        assert_eq!(update.longitude, 18.4241);
    }

    #[test]
    fn test_decode_accepts_bytes() {
        let update = decode(br#"{"id":"T2","latitude":1,"longitude":2}"#.to_vec()).unwrap();
        assert_eq!(update.id.as_deref(), Some("T2"));
        assert_eq!(update.latitude, 1.0);
        assert_eq!(update.longitude, 2.0);
    }

    #[test]
    fn test_non_json_is_malformed() {
        let err = decode("not json at all").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));

        let err = decode("").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_non_object_is_malformed() {
        let err = decode("[1, 2]").unwrap_err();
        match err {
            DecodeError::Malformed { reason } => assert!(reason.contains("array")),
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let err = decode([0xff, 0xfe, 0x7b]).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_missing_latitude() {
        let err = decode(r#"{"truckId":"T1","longitude":2}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingCoordinates { field: "latitude" });
    }

    #[test]
    fn test_missing_longitude() {
        let err = decode(r#"{"truckId":"T1","latitude":2}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingCoordinates { field: "longitude" });
    }

    #[test]
    fn test_non_numeric_coordinate() {
        let err = decode(r#"{"truckId":"T1","latitude":"12.5","longitude":2}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingCoordinates { field: "latitude" });

        let err = decode(r#"{"truckId":"T1","latitude":1,"longitude":null}"#).unwrap_err();
        assert_eq!(err, DecodeError::MissingCoordinates { field: "longitude" });
    }

    #[test]
    fn test_numeric_id_is_stringified() {
        let update = decode(r#"{"id":42,"latitude":1,"longitude":2}"#).unwrap();
        assert_eq!(update.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_other_id_types_are_absent() {
        let update = decode(r#"{"truckId":true,"id":{"x":1},"latitude":1,"longitude":2}"#).unwrap();
        assert_eq!(update.truck_id, None);
        assert_eq!(update.id, None);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let update =
            decode(r#"{"truckId":"T1","speed":80,"latitude":1,"longitude":2,"heading":90}"#)
                .unwrap();
        assert_eq!(update.truck_id.as_deref(), Some("T1"));
    }

    #[test]
    fn test_out_of_range_coordinates_accepted() {
        let update = decode(r#"{"truckId":"T1","latitude":123.0,"longitude":-500.0}"#).unwrap();
        assert_eq!(update.latitude, 123.0);
        assert_eq!(update.longitude, -500.0);
    }
}

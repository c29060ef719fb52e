use chrono::{DateTime, NaiveDateTime, Utc};
use common::domain::{canonicalize_vehicle_key, RawTelemetryRow, VehiclePosition};
use common::geo;
use serde_json::Value;
use std::fmt;

const IDENTIFIER_FIELDS: &[&str] = &[
    "objectname",
    "vehicle_key",
    "vehicleKey",
    "registration",
    "vehicle",
    "name",
];
const LATITUDE_FIELDS: &[&str] = &["latitude", "lat"];
const LONGITUDE_FIELDS: &[&str] = &["longitude", "lng", "lon"];
const LATITUDE_MDEG_FIELD: &str = "latitude_mdeg";
const LONGITUDE_MDEG_FIELD: &str = "longitude_mdeg";
const SPEED_FIELDS: &[&str] = &["speed", "speed_kph", "speedKph"];
const HEADING_FIELDS: &[&str] = &["course", "heading"];
const POS_TIME_FIELDS: &[&str] = &["pos_time", "posTime", "timestamp"];

const MICRO_DEGREES: f64 = 1_000_000.0;

/// Naive timestamp layouts, all read as UTC
const NAIVE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// Why a raw row did not become a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingIdentifier,
    UnparsableCoordinates,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingIdentifier => write!(f, "missing vehicle identifier"),
            RejectReason::UnparsableCoordinates => write!(f, "missing or unparsable coordinates"),
        }
    }
}

/// Result of normalizing one provider row
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRow {
    Accepted(VehiclePosition),
    Rejected(RejectReason),
}

/// Turn one provider row into a canonical position.
///
/// Only the identifier and the coordinates can reject a row. Speed, heading
/// and observation time that are present but malformed are dropped to `None`.
pub fn normalize_row(row: RawTelemetryRow) -> NormalizedRow {
    let Some(vehicle_key) = first_parsed(&row, IDENTIFIER_FIELDS, parse_identifier) else {
        return NormalizedRow::Rejected(RejectReason::MissingIdentifier);
    };

    let Some((lat, lng)) = parse_coordinates(&row) else {
        return NormalizedRow::Rejected(RejectReason::UnparsableCoordinates);
    };

    let speed_kph = first_parsed(&row, SPEED_FIELDS, parse_speed);
    let heading = first_parsed(&row, HEADING_FIELDS, |value| {
        parse_number(value).and_then(geo::normalize_heading)
    });
    let pos_time = first_parsed(&row, POS_TIME_FIELDS, parse_timestamp);

    NormalizedRow::Accepted(VehiclePosition {
        vehicle_key,
        lat,
        lng,
        speed_kph,
        heading,
        pos_time,
        raw: row,
    })
}

/// First alias, in order, whose value `parse` accepts
fn first_parsed<T>(
    row: &RawTelemetryRow,
    fields: &[&str],
    parse: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    fields
        .iter()
        .filter_map(|field| row.field(field))
        .find_map(parse)
}

fn parse_identifier(value: &Value) -> Option<String> {
    let key = match value {
        Value::String(s) => canonicalize_vehicle_key(s),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!key.is_empty()).then_some(key)
}

/// JSON number or numeric string; non-finite values count as absent
fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn parse_speed(value: &Value) -> Option<f64> {
    parse_number(value).filter(|speed| *speed >= 0.0)
}

fn parse_coordinates(row: &RawTelemetryRow) -> Option<(f64, f64)> {
    let degrees = first_parsed(row, LATITUDE_FIELDS, parse_number)
        .zip(first_parsed(row, LONGITUDE_FIELDS, parse_number));

    let (lat, lng) = match degrees {
        Some(pair) => pair,
        None => {
            let lat = row.field(LATITUDE_MDEG_FIELD).and_then(parse_number)?;
            let lng = row.field(LONGITUDE_MDEG_FIELD).and_then(parse_number)?;
            (lat / MICRO_DEGREES, lng / MICRO_DEGREES)
        }
    };

    geo::is_valid_coordinate(lat, lng).then_some((lat, lng))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn accepted(value: Value) -> VehiclePosition {
        match normalize_row(RawTelemetryRow::new(value)) {
            NormalizedRow::Accepted(position) => position,
            NormalizedRow::Rejected(reason) => panic!("expected accepted row, got {reason}"),
        }
    }

    fn rejected(value: Value) -> RejectReason {
        match normalize_row(RawTelemetryRow::new(value)) {
            NormalizedRow::Rejected(reason) => reason,
            NormalizedRow::Accepted(position) => panic!("expected rejection, got {position:?}"),
        }
    }

    #[test]
    fn test_identifier_is_canonicalized() {
        let padded = accepted(json!({"objectname": " d1mlc ", "latitude": 51.5, "longitude": -0.1}));
        let plain = accepted(json!({"objectname": "D1MLC", "latitude": 51.5, "longitude": -0.1}));

        assert_eq!(padded.vehicle_key, "D1MLC");
        assert_eq!(padded.vehicle_key, plain.vehicle_key);
    }

    #[test]
    fn test_identifier_aliases_in_order() {
        let position = accepted(json!({
            "registration": "ab12 cde",
            "name": "ignored",
            "lat": "52.1",
            "lng": "-1.5"
        }));
        assert_eq!(position.vehicle_key, "AB12CDE");

        let numeric = accepted(json!({"vehicle": 4021, "lat": 0, "lon": 0}));
        assert_eq!(numeric.vehicle_key, "4021");
    }

    #[test]
    fn test_unusable_alias_falls_through_to_next() {
        let position = accepted(json!({
            "objectname": "  ",
            "vehicle_key": {"id": 7},
            "registration": "AB12CDE",
            "latitude": "n/a",
            "lat": 51.5,
            "longitude": null,
            "lng": "-0.1",
            "speed": -4,
            "speed_kph": "30",
            "course": "west",
            "heading": 450,
            "pos_time": "soon",
            "timestamp": "2024-03-09T14:05:30Z"
        }));

        assert_eq!(position.vehicle_key, "AB12CDE");
        assert_eq!((position.lat, position.lng), (51.5, -0.1));
        assert_eq!(position.speed_kph, Some(30.0));
        assert_eq!(position.heading, Some(90.0));
        assert_eq!(
            position.pos_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 30).unwrap())
        );
    }

    #[test]
    fn test_missing_identifier_rejects() {
        assert_eq!(
            rejected(json!({"latitude": 51.5, "longitude": -0.1})),
            RejectReason::MissingIdentifier
        );
        assert_eq!(
            rejected(json!({"objectname": "   ", "latitude": 51.5, "longitude": -0.1})),
            RejectReason::MissingIdentifier
        );
        assert_eq!(
            rejected(json!({"objectname": null, "latitude": 51.5, "longitude": -0.1})),
            RejectReason::MissingIdentifier
        );
        assert_eq!(rejected(json!("not an object")), RejectReason::MissingIdentifier);
    }

    #[test]
    fn test_unparsable_coordinates_reject() {
        let cases = [
            json!({"objectname": "A"}),
            json!({"objectname": "A", "latitude": "north", "longitude": -0.1}),
            json!({"objectname": "A", "latitude": 51.5}),
            json!({"objectname": "A", "latitude": 91.0, "longitude": 0.0}),
            json!({"objectname": "A", "latitude": 0.0, "longitude": -180.5}),
            json!({"objectname": "A", "latitude": "NaN", "longitude": 0.0}),
        ];

        for case in cases {
            assert_eq!(rejected(case), RejectReason::UnparsableCoordinates);
        }
    }

    #[test]
    fn test_micro_degree_coordinates() {
        let position = accepted(json!({
            "objectname": "D1MLC",
            "latitude_mdeg": 51507400,
            "longitude_mdeg": "-127800"
        }));

        assert!((position.lat - 51.5074).abs() < 1e-9);
        assert!((position.lng - -0.1278).abs() < 1e-9);
    }

    #[test]
    fn test_malformed_optional_fields_become_absent() {
        let position = accepted(json!({
            "objectname": "A",
            "latitude": 51.5,
            "longitude": -0.1,
            "speed": "fast",
            "course": {"deg": 10},
            "pos_time": "yesterday"
        }));

        assert_eq!(position.speed_kph, None);
        assert_eq!(position.heading, None);
        assert_eq!(position.pos_time, None);
    }

    #[test]
    fn test_negative_speed_is_absent() {
        let position = accepted(json!({
            "objectname": "A",
            "latitude": 51.5,
            "longitude": -0.1,
            "speed": -3
        }));
        assert_eq!(position.speed_kph, None);
    }

    #[test]
    fn test_speed_and_heading() {
        let position = accepted(json!({
            "objectname": "A",
            "latitude": 51.5,
            "longitude": -0.1,
            "speedKph": "64.5",
            "heading": -90
        }));

        assert_eq!(position.speed_kph, Some(64.5));
        assert_eq!(position.heading, Some(270.0));
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 30).unwrap();

        for text in [
            "2024-03-09T14:05:30Z",
            "2024-03-09T15:05:30+01:00",
            "2024-03-09T14:05:30",
            "09/03/2024 14:05:30",
        ] {
            let position = accepted(json!({
                "objectname": "A",
                "latitude": 51.5,
                "longitude": -0.1,
                "pos_time": text
            }));
            assert_eq!(position.pos_time, Some(expected), "format {text}");
        }
    }

    #[test]
    fn test_raw_row_is_retained() {
        let value = json!({"objectname": "A", "latitude": 51.5, "longitude": -0.1, "extra": true});
        let position = accepted(value.clone());
        assert_eq!(position.raw.as_value(), &value);
    }
}

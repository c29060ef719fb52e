use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row exactly as the telemetry provider returned it.
/// The shape is provider-defined; it is kept alongside the cached position for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTelemetryRow(pub serde_json::Value);

impl RawTelemetryRow {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Look up a top-level field when the row is a JSON object
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.as_object().and_then(|map| map.get(name))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Canonical position of one vehicle, as produced by the row normalizer
#[derive(Debug, Clone, PartialEq)]
pub struct VehiclePosition {
    pub vehicle_key: String,
    pub lat: f64,
    pub lng: f64,
    pub speed_kph: Option<f64>,
    pub heading: Option<f64>,
    pub pos_time: Option<DateTime<Utc>>,
    pub raw: RawTelemetryRow,
}

impl VehiclePosition {
    /// Stamp this position with the time it is written to the cache
    pub fn into_cached(self, collected_at: DateTime<Utc>) -> CachedVehiclePosition {
        CachedVehiclePosition {
            position: self,
            collected_at,
        }
    }
}

/// Current-state record: the latest position for a vehicle plus its cache write time
#[derive(Debug, Clone, PartialEq)]
pub struct CachedVehiclePosition {
    pub position: VehiclePosition,
    pub collected_at: DateTime<Utc>,
}

impl CachedVehiclePosition {
    pub fn vehicle_key(&self) -> &str {
        &self.position.vehicle_key
    }

    /// Best-effort observation time: the provider's timestamp when present, else the write time
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.position.pos_time.unwrap_or(self.collected_at)
    }
}

/// History log entry. Append-only, no uniqueness per vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehiclePositionLogEntry {
    pub vehicle_key: String,
    pub lat: f64,
    pub lng: f64,
    pub speed_kph: Option<f64>,
    pub heading: Option<f64>,
    pub pos_time: Option<DateTime<Utc>>,
}

impl From<&VehiclePosition> for VehiclePositionLogEntry {
    fn from(position: &VehiclePosition) -> Self {
        VehiclePositionLogEntry {
            vehicle_key: position.vehicle_key.clone(),
            lat: position.lat,
            lng: position.lng,
            speed_kph: position.speed_kph,
            heading: position.heading,
            pos_time: position.pos_time,
        }
    }
}

/// Input for upserting current positions (batch operation)
#[derive(Debug, Clone)]
pub struct UpsertPositionsInput {
    pub positions: Vec<CachedVehiclePosition>,
}

/// Input for appending to the position history (batch operation)
#[derive(Debug, Clone)]
pub struct AppendPositionLogInput {
    pub entries: Vec<VehiclePositionLogEntry>,
}

/// Canonical form of a vehicle identifier: whitespace removed, upper-cased.
///
/// Used both when keying collected rows and when normalizing lookups, so
/// `" d1 mlc "`, `"D1MLC"` and `"d1mlc"` all address the same record.
pub fn canonicalize_vehicle_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Repository trait for the current-state position store
/// Infrastructure layer (e.g., postgres) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait VehiclePositionRepository: Send + Sync {
    /// Upsert a batch keyed by vehicle key.
    /// Failure handling: entire batch fails atomically (all-or-nothing)
    async fn upsert_positions(&self, input: UpsertPositionsInput) -> DomainResult<()>;

    /// Get the position stored under exactly this key
    async fn get_position(&self, vehicle_key: &str) -> DomainResult<Option<CachedVehiclePosition>>;

    /// Get the lexicographically smallest key containing `fragment` (case-insensitive)
    async fn find_position_containing(
        &self,
        fragment: &str,
    ) -> DomainResult<Option<CachedVehiclePosition>>;
}

/// Repository trait for the append-only position history
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PositionLogRepository: Send + Sync {
    /// Append a batch of history entries
    async fn append_entries(&self, input: AppendPositionLogInput) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_position() -> VehiclePosition {
        VehiclePosition {
            vehicle_key: "D1MLC".to_string(),
            lat: 51.5,
            lng: -0.12,
            speed_kph: Some(42.0),
            heading: Some(90.0),
            pos_time: None,
            raw: RawTelemetryRow::new(serde_json::json!({"objectname": "D1MLC"})),
        }
    }

    #[test]
    fn test_canonicalize_vehicle_key() {
        assert_eq!(canonicalize_vehicle_key(" d1mlc "), "D1MLC");
        assert_eq!(canonicalize_vehicle_key("D1MLC"), "D1MLC");
        assert_eq!(canonicalize_vehicle_key("d1 mlc\t"), "D1MLC");
        assert_eq!(canonicalize_vehicle_key("   "), "");
    }

    #[test]
    fn test_observed_at_prefers_provider_time() {
        let collected_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let pos_time = Utc.with_ymd_and_hms(2024, 5, 1, 11, 58, 0).unwrap();

        let without_pos_time = sample_position().into_cached(collected_at);
        assert_eq!(without_pos_time.observed_at(), collected_at);

        let mut position = sample_position();
        position.pos_time = Some(pos_time);
        let with_pos_time = position.into_cached(collected_at);
        assert_eq!(with_pos_time.observed_at(), pos_time);
    }

    #[test]
    fn test_log_entry_drops_raw_row() {
        let position = sample_position();
        let entry = VehiclePositionLogEntry::from(&position);

        assert_eq!(entry.vehicle_key, "D1MLC");
        assert_eq!(entry.speed_kph, Some(42.0));
        assert_eq!(entry.heading, Some(90.0));
    }

    #[test]
    fn test_raw_row_field_lookup() {
        let row = RawTelemetryRow::new(serde_json::json!({"objectname": "X1"}));
        assert_eq!(row.field("objectname"), Some(&serde_json::json!("X1")));
        assert!(row.field("missing").is_none());

        let not_an_object = RawTelemetryRow::new(serde_json::json!([1, 2]));
        assert!(not_an_object.field("objectname").is_none());
    }
}

use crate::domain::result::DomainResult;
use crate::domain::vehicle_position::{
    AppendPositionLogInput, CachedVehiclePosition, PositionLogRepository, UpsertPositionsInput,
    VehiclePositionLogEntry, VehiclePositionRepository,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of VehiclePositionRepository using a BTreeMap.
///
/// Keys iterate in lexicographic order, which gives the fuzzy lookup the same
/// "smallest matching key" tie-break as the PostgreSQL store.
#[derive(Clone, Default)]
pub struct InMemoryVehiclePositionRepository {
    positions: Arc<RwLock<BTreeMap<String, CachedVehiclePosition>>>,
}

impl InMemoryVehiclePositionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.positions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.positions.read().await.is_empty()
    }
}

#[async_trait]
impl VehiclePositionRepository for InMemoryVehiclePositionRepository {
    async fn upsert_positions(&self, input: UpsertPositionsInput) -> DomainResult<()> {
        // Single write guard for the whole batch so readers never see half of it
        let mut positions = self.positions.write().await;
        for position in input.positions {
            positions.insert(position.position.vehicle_key.clone(), position);
        }
        Ok(())
    }

    async fn get_position(&self, vehicle_key: &str) -> DomainResult<Option<CachedVehiclePosition>> {
        let positions = self.positions.read().await;
        Ok(positions.get(vehicle_key).cloned())
    }

    async fn find_position_containing(
        &self,
        fragment: &str,
    ) -> DomainResult<Option<CachedVehiclePosition>> {
        let needle = fragment.to_uppercase();
        let positions = self.positions.read().await;
        Ok(positions
            .iter()
            .find(|(key, _)| key.to_uppercase().contains(&needle))
            .map(|(_, position)| position.clone()))
    }
}

/// In-memory append-only position history
#[derive(Clone, Default)]
pub struct InMemoryPositionLogRepository {
    entries: Arc<RwLock<Vec<VehiclePositionLogEntry>>>,
}

impl InMemoryPositionLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every appended entry, oldest first
    pub async fn entries(&self) -> Vec<VehiclePositionLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl PositionLogRepository for InMemoryPositionLogRepository {
    async fn append_entries(&self, input: AppendPositionLogInput) -> DomainResult<()> {
        let mut entries = self.entries.write().await;
        entries.extend(input.entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RawTelemetryRow, VehiclePosition};
    use chrono::Utc;

    fn cached(key: &str, speed: f64) -> CachedVehiclePosition {
        VehiclePosition {
            vehicle_key: key.to_string(),
            lat: 52.0,
            lng: -1.0,
            speed_kph: Some(speed),
            heading: None,
            pos_time: None,
            raw: RawTelemetryRow::new(serde_json::json!({})),
        }
        .into_cached(Utc::now())
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_key() {
        let repo = InMemoryVehiclePositionRepository::new();

        repo.upsert_positions(UpsertPositionsInput {
            positions: vec![cached("A1", 10.0)],
        })
        .await
        .unwrap();
        repo.upsert_positions(UpsertPositionsInput {
            positions: vec![cached("A1", 20.0)],
        })
        .await
        .unwrap();

        assert_eq!(repo.len().await, 1);
        let stored = repo.get_position("A1").await.unwrap().unwrap();
        assert_eq!(stored.position.speed_kph, Some(20.0));
    }

    #[tokio::test]
    async fn test_find_containing_returns_smallest_key() {
        let repo = InMemoryVehiclePositionRepository::new();
        repo.upsert_positions(UpsertPositionsInput {
            positions: vec![cached("XMLC9", 1.0), cached("D1MLC", 2.0), cached("B2MLC", 3.0)],
        })
        .await
        .unwrap();

        let found = repo.find_position_containing("mlc").await.unwrap().unwrap();
        assert_eq!(found.vehicle_key(), "B2MLC");

        assert!(repo.find_position_containing("ZZZ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_log_appends_without_dedup() {
        let repo = InMemoryPositionLogRepository::new();
        let entry = VehiclePositionLogEntry::from(&cached("A1", 5.0).position);

        repo.append_entries(AppendPositionLogInput {
            entries: vec![entry.clone()],
        })
        .await
        .unwrap();
        repo.append_entries(AppendPositionLogInput {
            entries: vec![entry],
        })
        .await
        .unwrap();

        assert_eq!(repo.entries().await.len(), 2);
    }
}

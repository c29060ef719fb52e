use crate::clickhouse::ClickHouseClient;
use crate::domain::{
    AppendPositionLogInput, DomainError, DomainResult, PositionLogRepository,
    VehiclePositionLogEntry,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

/// History row. The table's `inserted_at DEFAULT now()` column is filled in server-side.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct VehiclePositionLogRow {
    pub vehicle_key: String,
    pub lat: f64,
    pub lng: f64,
    pub speed_kph: Option<f64>,
    pub heading: Option<f64>,
    #[serde(with = "clickhouse::serde::chrono::datetime::option")]
    pub pos_time: Option<DateTime<Utc>>,
}

/// Convert domain VehiclePositionLogEntry to database VehiclePositionLogRow
impl From<&VehiclePositionLogEntry> for VehiclePositionLogRow {
    fn from(entry: &VehiclePositionLogEntry) -> Self {
        VehiclePositionLogRow {
            vehicle_key: entry.vehicle_key.clone(),
            lat: entry.lat,
            lng: entry.lng,
            speed_kph: entry.speed_kph,
            heading: entry.heading,
            pos_time: entry.pos_time,
        }
    }
}

/// ClickHouse implementation of PositionLogRepository
#[derive(Clone)]
pub struct ClickHousePositionLogRepository {
    client: ClickHouseClient,
    table: String,
}

impl ClickHousePositionLogRepository {
    pub fn new(client: ClickHouseClient, table: String) -> Self {
        Self { client, table }
    }
}

#[async_trait]
impl PositionLogRepository for ClickHousePositionLogRepository {
    #[instrument(skip(self, input), fields(entry_count = input.entries.len(), table = %self.table))]
    async fn append_entries(&self, input: AppendPositionLogInput) -> DomainResult<()> {
        if input.entries.is_empty() {
            debug!("no history entries to append, skipping");
            return Ok(());
        }

        let rows: Vec<VehiclePositionLogRow> =
            input.entries.iter().map(VehiclePositionLogRow::from).collect();

        let mut insert = self
            .client
            .get_client()
            .insert::<VehiclePositionLogRow>(&self.table)
            .await
            .map_err(|e| {
                error!("failed to create ClickHouse insert: {}", e);
                DomainError::RepositoryError(e.into())
            })?;

        for row in &rows {
            insert.write(row).await.map_err(|e| {
                error!("failed to write row to ClickHouse: {}", e);
                DomainError::RepositoryError(e.into())
            })?;
        }

        insert.end().await.map_err(|e| {
            error!("failed to finalize ClickHouse insert: {}", e);
            DomainError::RepositoryError(e.into())
        })?;

        debug!(rows_inserted = rows.len(), "appended position history");
        Ok(())
    }
}

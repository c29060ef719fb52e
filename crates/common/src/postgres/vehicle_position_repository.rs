use crate::domain::{
    CachedVehiclePosition, DomainError, DomainResult, RawTelemetryRow, UpsertPositionsInput,
    VehiclePosition, VehiclePositionRepository,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

/// Vehicle position row for PostgreSQL storage
#[derive(Debug, Clone)]
pub struct VehiclePositionRow {
    pub vehicle_key: String,
    pub lat: f64,
    pub lng: f64,
    pub speed_kph: Option<f64>,
    pub heading: Option<f64>,
    pub pos_time: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
    pub collected_at: DateTime<Utc>,
}

impl From<&tokio_postgres::Row> for VehiclePositionRow {
    fn from(row: &tokio_postgres::Row) -> Self {
        VehiclePositionRow {
            vehicle_key: row.get(0),
            lat: row.get(1),
            lng: row.get(2),
            speed_kph: row.get(3),
            heading: row.get(4),
            pos_time: row.get(5),
            raw: row.get(6),
            collected_at: row.get(7),
        }
    }
}

/// Convert database VehiclePositionRow to domain CachedVehiclePosition
impl From<VehiclePositionRow> for CachedVehiclePosition {
    fn from(row: VehiclePositionRow) -> Self {
        CachedVehiclePosition {
            position: VehiclePosition {
                vehicle_key: row.vehicle_key,
                lat: row.lat,
                lng: row.lng,
                speed_kph: row.speed_kph,
                heading: row.heading,
                pos_time: row.pos_time,
                raw: RawTelemetryRow::new(row.raw),
            },
            collected_at: row.collected_at,
        }
    }
}

/// PostgreSQL implementation of VehiclePositionRepository trait
#[derive(Clone)]
pub struct PostgresVehiclePositionRepository {
    client: PostgresClient,
}

impl PostgresVehiclePositionRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VehiclePositionRepository for PostgresVehiclePositionRepository {
    /// One statement per batch: the UNNEST insert either lands every row or none.
    /// Keys within a batch must be unique (ON CONFLICT cannot touch a row twice).
    #[instrument(skip(self, input), fields(position_count = input.positions.len()))]
    async fn upsert_positions(&self, input: UpsertPositionsInput) -> DomainResult<()> {
        if input.positions.is_empty() {
            debug!("no positions to upsert, skipping");
            return Ok(());
        }

        let len = input.positions.len();
        let mut keys = Vec::with_capacity(len);
        let mut lats = Vec::with_capacity(len);
        let mut lngs = Vec::with_capacity(len);
        let mut speeds: Vec<Option<f64>> = Vec::with_capacity(len);
        let mut headings: Vec<Option<f64>> = Vec::with_capacity(len);
        let mut pos_times: Vec<Option<DateTime<Utc>>> = Vec::with_capacity(len);
        let mut raws = Vec::with_capacity(len);
        let mut collected_ats = Vec::with_capacity(len);

        for cached in input.positions {
            let position = cached.position;
            keys.push(position.vehicle_key);
            lats.push(position.lat);
            lngs.push(position.lng);
            speeds.push(position.speed_kph);
            headings.push(position.heading);
            pos_times.push(position.pos_time);
            raws.push(position.raw.0);
            collected_ats.push(cached.collected_at);
        }

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let affected = conn
            .execute(
                "INSERT INTO vehicle_positions (vehicle_key, lat, lng, speed_kph, heading, pos_time, raw, collected_at)
                 SELECT * FROM UNNEST($1::text[], $2::float8[], $3::float8[], $4::float8[], $5::float8[], $6::timestamptz[], $7::jsonb[], $8::timestamptz[])
                 ON CONFLICT (vehicle_key) DO UPDATE SET
                     lat = EXCLUDED.lat,
                     lng = EXCLUDED.lng,
                     speed_kph = EXCLUDED.speed_kph,
                     heading = EXCLUDED.heading,
                     pos_time = EXCLUDED.pos_time,
                     raw = EXCLUDED.raw,
                     collected_at = EXCLUDED.collected_at",
                &[
                    &keys,
                    &lats,
                    &lngs,
                    &speeds,
                    &headings,
                    &pos_times,
                    &raws,
                    &collected_ats,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(rows_affected = affected, "upserted vehicle positions");
        Ok(())
    }

    #[instrument(skip_all, fields(vehicle_key = %vehicle_key))]
    async fn get_position(&self, vehicle_key: &str) -> DomainResult<Option<CachedVehiclePosition>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT vehicle_key, lat, lng, speed_kph, heading, pos_time, raw, collected_at
                 FROM vehicle_positions
                 WHERE vehicle_key = $1",
                &[&vehicle_key],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| VehiclePositionRow::from(&row).into()))
    }

    #[instrument(skip_all, fields(fragment = %fragment))]
    async fn find_position_containing(
        &self,
        fragment: &str,
    ) -> DomainResult<Option<CachedVehiclePosition>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        // strpos avoids LIKE wildcard escaping; COLLATE "C" makes the tie-break byte order
        let row = conn
            .query_opt(
                "SELECT vehicle_key, lat, lng, speed_kph, heading, pos_time, raw, collected_at
                 FROM vehicle_positions
                 WHERE strpos(upper(vehicle_key), upper($1)) > 0
                 ORDER BY vehicle_key COLLATE \"C\"
                 LIMIT 1",
                &[&fragment],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match row {
            Some(row) => {
                let position_row = VehiclePositionRow::from(&row);
                debug!("fuzzy match resolved to: {}", position_row.vehicle_key);
                Ok(Some(position_row.into()))
            }
            None => Ok(None),
        }
    }
}

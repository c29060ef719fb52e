use chrono::{DateTime, Utc};
use common::domain::{
    AppendPositionLogInput, DomainError, DomainResult, PositionLogRepository,
    UpsertPositionsInput, VehiclePosition, VehiclePositionLogEntry, VehiclePositionRepository,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// What a successful write produced
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    /// Keys written to the current-state store, sorted
    pub vehicle_keys: Vec<String>,
    pub collected_at: DateTime<Utc>,
    /// Set when the history append failed; the cache write still stands
    pub history_warning: Option<String>,
}

/// Writes a deduplicated batch to the current-state store, then the history log.
///
/// Failure domains:
/// - upsert failure is returned as `CacheWriteError` and the history log is not touched
/// - append failure is logged and reported in [`WriteOutcome::history_warning`]
pub struct CacheWriter {
    position_repository: Arc<dyn VehiclePositionRepository>,
    log_repository: Arc<dyn PositionLogRepository>,
}

impl CacheWriter {
    pub fn new(
        position_repository: Arc<dyn VehiclePositionRepository>,
        log_repository: Arc<dyn PositionLogRepository>,
    ) -> Self {
        Self {
            position_repository,
            log_repository,
        }
    }

    #[instrument(skip_all, fields(position_count = positions.len()))]
    pub async fn write(
        &self,
        positions: BTreeMap<String, VehiclePosition>,
    ) -> DomainResult<WriteOutcome> {
        let collected_at = Utc::now();
        let vehicle_keys: Vec<String> = positions.keys().cloned().collect();

        if positions.is_empty() {
            return Ok(WriteOutcome {
                vehicle_keys,
                collected_at,
                history_warning: None,
            });
        }

        let entries: Vec<VehiclePositionLogEntry> =
            positions.values().map(VehiclePositionLogEntry::from).collect();
        let cached = positions
            .into_values()
            .map(|position| position.into_cached(collected_at))
            .collect();

        self.position_repository
            .upsert_positions(UpsertPositionsInput { positions: cached })
            .await
            .map_err(|e| {
                error!(error = %e, "current-state upsert failed");
                DomainError::CacheWriteError(e.to_string())
            })?;

        debug!(count = vehicle_keys.len(), "current-state upsert complete");

        let history_warning = match self
            .log_repository
            .append_entries(AppendPositionLogInput { entries })
            .await
        {
            Ok(()) => None,
            Err(e) => {
                let warning = DomainError::HistoryWriteError(e.to_string());
                warn!(error = %warning, "history append failed, cache write kept");
                Some(warning.to_string())
            }
        };

        Ok(WriteOutcome {
            vehicle_keys,
            collected_at,
            history_warning,
        })
    }
}

use crate::domain::{deduplicate, normalize_row, CacheWriter, NormalizedRow};
use common::domain::{DomainError, DomainResult, TelemetryProvider};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

pub const NO_ROWS_MESSAGE: &str = "provider returned no rows";
pub const NO_VALID_ROWS_MESSAGE: &str = "no rows passed normalization";

/// Result of one collection cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionOutcome {
    pub upserted: usize,
    /// Keys written this cycle, sorted
    pub vehicle_keys: Vec<String>,
    pub duration: Duration,
    /// Explanation for zero-count cycles
    pub message: Option<String>,
    pub history_warning: Option<String>,
}

/// Drives one collection cycle: authorize, fetch, normalize, deduplicate, write.
///
/// Holds no per-cycle state, so concurrent cycles may run and interleave their
/// writes; whichever upsert lands last for a key is what readers see.
pub struct CollectionService {
    provider: Arc<dyn TelemetryProvider>,
    cache_writer: CacheWriter,
    secret_digest: Option<Vec<u8>>,
}

impl CollectionService {
    /// `secret` of `None` or `""` leaves the trigger unauthenticated.
    pub fn new(
        provider: Arc<dyn TelemetryProvider>,
        cache_writer: CacheWriter,
        secret: Option<String>,
    ) -> Self {
        let secret_digest = secret
            .filter(|s| !s.is_empty())
            .map(|s| Sha256::digest(s.as_bytes()).to_vec());

        Self {
            provider,
            cache_writer,
            secret_digest,
        }
    }

    /// Authorize the caller's bearer credential, then run a cycle.
    pub async fn collect(&self, credential: Option<&str>) -> DomainResult<CollectionOutcome> {
        self.authorize(credential)?;
        self.run_cycle().await
    }

    /// Compares SHA-256 digests of the presented and configured secrets.
    pub fn authorize(&self, credential: Option<&str>) -> DomainResult<()> {
        let Some(expected) = &self.secret_digest else {
            return Ok(());
        };

        match credential {
            Some(presented)
                if Sha256::digest(presented.as_bytes()).as_slice() == expected.as_slice() =>
            {
                Ok(())
            }
            Some(_) => {
                warn!("collection trigger rejected: credential mismatch");
                Err(DomainError::Unauthorized("invalid credential".to_string()))
            }
            None => {
                warn!("collection trigger rejected: credential missing");
                Err(DomainError::Unauthorized("missing credential".to_string()))
            }
        }
    }

    /// One cycle without the authorization step, for trusted in-process callers.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> DomainResult<CollectionOutcome> {
        let started = Instant::now();

        let rows = self.provider.fetch_all().await.map_err(|e| {
            error!(error = %e, "provider fetch failed");
            if matches!(e, DomainError::ProviderError(_)) {
                e
            } else {
                DomainError::ProviderError(e.to_string())
            }
        })?;

        let fetched = rows.len();
        if fetched == 0 {
            info!("provider returned no rows");
            return Ok(Self::empty_outcome(started, NO_ROWS_MESSAGE));
        }

        let mut accepted = Vec::with_capacity(fetched);
        let mut rejected = 0usize;
        for row in rows {
            match normalize_row(row) {
                NormalizedRow::Accepted(position) => accepted.push(position),
                NormalizedRow::Rejected(reason) => {
                    rejected += 1;
                    debug!(%reason, "row rejected");
                }
            }
        }

        if accepted.is_empty() {
            info!(fetched, rejected, "no rows passed normalization");
            return Ok(Self::empty_outcome(started, NO_VALID_ROWS_MESSAGE));
        }

        let accepted_count = accepted.len();
        let positions = deduplicate(accepted);
        let duplicates = accepted_count - positions.len();

        let written = self.cache_writer.write(positions).await?;
        let duration = started.elapsed();

        info!(
            fetched,
            accepted = accepted_count,
            rejected,
            duplicates,
            upserted = written.vehicle_keys.len(),
            duration_ms = duration.as_millis() as u64,
            "collection cycle complete"
        );

        Ok(CollectionOutcome {
            upserted: written.vehicle_keys.len(),
            vehicle_keys: written.vehicle_keys,
            duration,
            message: None,
            history_warning: written.history_warning,
        })
    }

    fn empty_outcome(started: Instant, message: &str) -> CollectionOutcome {
        CollectionOutcome {
            upserted: 0,
            vehicle_keys: Vec::new(),
            duration: started.elapsed(),
            message: Some(message.to_string()),
            history_warning: None,
        }
    }
}

use crate::domain::CollectionService;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs collection cycles on a fixed period inside the process.
///
/// The first cycle runs one full period after start. A failed cycle is logged
/// and the next one runs on schedule.
pub struct CollectionTicker {
    service: Arc<CollectionService>,
    period: Duration,
}

impl CollectionTicker {
    pub fn new(service: Arc<CollectionService>, period: Duration) -> Self {
        Self { service, period }
    }

    /// Tick until cancellation. A cycle in flight when cancellation arrives is dropped.
    pub async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(
            interval_secs = self.period.as_secs(),
            "starting collection ticker"
        );

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("collection ticker shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.period) => {
                    tokio::select! {
                        _ = ctx.cancelled() => {
                            info!("collection ticker shutting down mid-cycle");
                            return Ok(());
                        }
                        result = self.service.run_cycle() => {
                            if let Err(e) = result {
                                warn!(error = %e, "scheduled collection cycle failed");
                            }
                        }
                    }
                }
            }
        }
    }
}

use crate::domain::{CacheWriter, CollectionService, CollectionTicker, QueryService};
use crate::http::{create_router, run_http_server, AppState};
use axum::Router;
use common::domain::{PositionLogRepository, TelemetryProvider, VehiclePositionRepository};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub type RunnerProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

pub struct PositionCacheConfig {
    /// `host:port` for the HTTP API
    pub http_addr: String,
    /// Shared secret for `/api/collect`; `None` or empty leaves it open
    pub collect_secret: Option<String>,
    /// Period of the in-process ticker; `None` disables it
    pub collect_interval: Option<Duration>,
    pub stale_after: Duration,
}

/// Collection and query services behind one HTTP API, plus the optional ticker
pub struct PositionCache {
    router: Router,
    http_addr: String,
    ticker: Option<CollectionTicker>,
}

impl PositionCache {
    pub fn new(
        provider: Arc<dyn TelemetryProvider>,
        position_repository: Arc<dyn VehiclePositionRepository>,
        log_repository: Arc<dyn PositionLogRepository>,
        config: PositionCacheConfig,
    ) -> Self {
        info!("Initializing position cache module");

        let cache_writer = CacheWriter::new(position_repository.clone(), log_repository);
        let collection_service = Arc::new(CollectionService::new(
            provider,
            cache_writer,
            config.collect_secret,
        ));
        let query_service = Arc::new(QueryService::new(position_repository, config.stale_after));

        let ticker = config
            .collect_interval
            .filter(|period| !period.is_zero())
            .map(|period| CollectionTicker::new(collection_service.clone(), period));

        let router = create_router(AppState {
            collection_service,
            query_service,
        });

        info!(
            ticker_enabled = ticker.is_some(),
            "Position cache module initialized"
        );

        Self {
            router,
            http_addr: config.http_addr,
            ticker,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Named processes for the runner: always the HTTP API, plus the ticker when enabled
    pub fn into_runner_processes(self) -> Vec<(&'static str, RunnerProcess)> {
        let mut processes: Vec<(&'static str, RunnerProcess)> = vec![(
            "http_api",
            Box::new({
                let router = self.router;
                let addr = self.http_addr;
                move |ctx| Box::pin(async move { run_http_server(router, addr, ctx).await })
            }),
        )];

        if let Some(ticker) = self.ticker {
            processes.push((
                "collection_ticker",
                Box::new(move |ctx| Box::pin(async move { ticker.run(ctx).await })),
            ));
        }

        processes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{InMemoryPositionLogRepository, InMemoryVehiclePositionRepository};
    use common::MockTelemetryProvider;

    fn module(collect_interval: Option<Duration>) -> PositionCache {
        PositionCache::new(
            Arc::new(MockTelemetryProvider::new()),
            Arc::new(InMemoryVehiclePositionRepository::new()),
            Arc::new(InMemoryPositionLogRepository::new()),
            PositionCacheConfig {
                http_addr: "127.0.0.1:0".to_string(),
                collect_secret: None,
                collect_interval,
                stale_after: Duration::from_secs(900),
            },
        )
    }

    #[test]
    fn test_ticker_process_only_when_enabled() {
        let names = |cache: PositionCache| -> Vec<&'static str> {
            cache
                .into_runner_processes()
                .into_iter()
                .map(|(name, _)| name)
                .collect()
        };

        assert_eq!(names(module(None)), vec!["http_api"]);
        assert_eq!(names(module(Some(Duration::ZERO))), vec!["http_api"]);
        assert_eq!(
            names(module(Some(Duration::from_secs(300)))),
            vec!["http_api", "collection_ticker"]
        );
    }

    #[tokio::test]
    async fn test_http_process_stops_on_cancellation() {
        let (_, http_process) = module(None).into_runner_processes().remove(0);
        let ctx = CancellationToken::new();
        ctx.cancel();

        assert!(http_process(ctx).await.is_ok());
    }
}

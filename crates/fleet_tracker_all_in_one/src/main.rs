mod config;

use common::clickhouse::{ClickHouseClient, ClickHousePositionLogRepository};
use common::postgres::{PostgresClient, PostgresVehiclePositionRepository};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use config::ServiceConfig;
use fleet_tracker_runner::Runner;
use goose::MigrationRunner;
use position_cache::{
    HttpTelemetryProvider, HttpTelemetryProviderConfig, PositionCache, PositionCacheConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // Configuration is validated here, before anything connects
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry (tracing + OpenTelemetry for traces and logs)
    let mut telemetry_config =
        TelemetryConfig::new(config.otel_service_name.clone(), config.log_level.clone());
    if config.otel_enabled {
        telemetry_config = telemetry_config.with_otlp_endpoint(config.otel_endpoint.clone());
    }
    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&telemetry_config) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        http_addr = %config.http_addr(),
        "Starting fleet-tracker service"
    );
    debug!(
        provider_url = %config.provider_url,
        collect_interval_secs = config.collect_interval_secs,
        collect_secret_configured = config.collect_secret().is_some(),
        "Configuration loaded"
    );

    // Store handles, built once and shared by every service
    let stores = match initialize_stores(&config).await {
        Ok(stores) => stores,
        Err(e) => {
            error!("Failed to initialize stores: {:#}", e);
            std::process::exit(1);
        }
    };

    let provider = match HttpTelemetryProvider::new(HttpTelemetryProviderConfig {
        url: config.provider_url.clone(),
        api_key: config.provider_api_key(),
        rows_field: config.provider_rows_field(),
        timeout: Duration::from_secs(config.provider_timeout_secs),
    }) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to initialize telemetry provider client: {:#}", e);
            std::process::exit(1);
        }
    };

    let position_cache = PositionCache::new(
        Arc::new(provider),
        stores.positions,
        stores.history,
        PositionCacheConfig {
            http_addr: config.http_addr(),
            collect_secret: config.collect_secret(),
            collect_interval: config.collect_interval(),
            stale_after: Duration::from_secs(config.position_stale_after_secs),
        },
    );

    let mut runner = Runner::new();
    for (name, process) in position_cache.into_runner_processes() {
        runner = runner.with_named_process(name, process);
    }

    runner = runner
        .with_closer(move || {
            Box::pin(async move {
                info!("Running cleanup tasks...");
                // Flush pending traces and logs
                shutdown_telemetry(telemetry_providers);
                info!("Cleanup complete");
                Ok(())
            })
        })
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}

struct Stores {
    positions: Arc<PostgresVehiclePositionRepository>,
    history: Arc<ClickHousePositionLogRepository>,
}

async fn initialize_stores(config: &ServiceConfig) -> anyhow::Result<Stores> {
    info!("Initializing PostgreSQL...");
    run_postgres_migrations(config).await?;
    let postgres_client = create_postgres_client(config).await?;

    info!("Initializing ClickHouse...");
    run_clickhouse_migrations(config).await?;
    let clickhouse_client = create_clickhouse_client(config).await?;

    Ok(Stores {
        positions: Arc::new(PostgresVehiclePositionRepository::new(postgres_client)),
        history: Arc::new(ClickHousePositionLogRepository::new(
            clickhouse_client,
            config.clickhouse_history_table.clone(),
        )),
    })
}

async fn run_postgres_migrations(config: &ServiceConfig) -> anyhow::Result<()> {
    let postgres_dsn = format!(
        "postgres://{}:{}@{}:{}/{}?sslmode=disable",
        config.postgres_username,
        config.postgres_password,
        config.postgres_host,
        config.postgres_port,
        config.postgres_database
    );
    let runner = MigrationRunner::new(
        config.postgres_goose_binary_path.clone(),
        config.postgres_migrations_dir.clone(),
        "postgres".to_string(),
        postgres_dsn,
    );
    runner.run_migrations().await
}

async fn run_clickhouse_migrations(config: &ServiceConfig) -> anyhow::Result<()> {
    let clickhouse_dsn = format!(
        "clickhouse://{}:{}@{}/{}",
        config.clickhouse_username,
        config.clickhouse_password,
        config.clickhouse_native_url,
        config.clickhouse_database
    );
    let runner = MigrationRunner::new(
        config.clickhouse_goose_binary_path.clone(),
        config.clickhouse_migrations_dir.clone(),
        "clickhouse".to_string(),
        clickhouse_dsn,
    );
    runner.run_migrations().await
}

async fn create_postgres_client(config: &ServiceConfig) -> anyhow::Result<PostgresClient> {
    let client = PostgresClient::new(
        &config.postgres_host,
        config.postgres_port,
        &config.postgres_database,
        &config.postgres_username,
        &config.postgres_password,
        config.postgres_max_pool_size,
    )?;
    client.ping().await?;
    Ok(client)
}

async fn create_clickhouse_client(config: &ServiceConfig) -> anyhow::Result<ClickHouseClient> {
    let client = ClickHouseClient::new(
        &config.clickhouse_url,
        &config.clickhouse_database,
        &config.clickhouse_username,
        &config.clickhouse_password,
    )?;
    client.ping().await?;
    Ok(client)
}

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // HTTP API
    #[serde(default = "default_http_host")]
    pub http_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    // Collection
    /// Shared secret expected as `Authorization: Bearer <secret>` on /api/collect.
    /// Empty means the endpoint is open.
    #[serde(default)]
    pub collect_secret: String,

    /// Period of the in-process collection ticker in seconds, 0 disables it
    #[serde(default)]
    pub collect_interval_secs: u64,

    // Telemetry provider
    /// Full URL of the provider's bulk position endpoint (required)
    #[serde(default)]
    pub provider_url: String,

    #[serde(default)]
    pub provider_api_key: String,

    /// JSON field holding the row array, empty when the body is the array itself
    #[serde(default)]
    pub provider_rows_field: String,

    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    // Query
    /// Positions observed longer ago than this are reported as stale
    #[serde(default = "default_position_stale_after_secs")]
    pub position_stale_after_secs: u64,

    // PostgreSQL configuration (current positions)
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    #[serde(default = "default_postgres_migrations_dir")]
    pub postgres_migrations_dir: String,

    #[serde(default = "default_goose_binary_path")]
    pub postgres_goose_binary_path: String,

    // ClickHouse configuration (position history)
    /// ClickHouse HTTP URL (for client connections)
    #[serde(default = "default_clickhouse_url")]
    pub clickhouse_url: String,

    /// ClickHouse native TCP address (for migrations with goose)
    #[serde(default = "default_clickhouse_native_url")]
    pub clickhouse_native_url: String,

    #[serde(default = "default_clickhouse_database")]
    pub clickhouse_database: String,

    #[serde(default = "default_clickhouse_username")]
    pub clickhouse_username: String,

    #[serde(default = "default_clickhouse_password")]
    pub clickhouse_password: String,

    #[serde(default = "default_clickhouse_history_table")]
    pub clickhouse_history_table: String,

    #[serde(default = "default_clickhouse_migrations_dir")]
    pub clickhouse_migrations_dir: String,

    #[serde(default = "default_goose_binary_path")]
    pub clickhouse_goose_binary_path: String,

    // OpenTelemetry configuration
    #[serde(default)]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("FLEET"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Settings without which the service cannot start
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("provider_url", &self.provider_url),
            ("postgres_host", &self.postgres_host),
            ("postgres_database", &self.postgres_database),
            ("postgres_username", &self.postgres_username),
            ("clickhouse_url", &self.clickhouse_url),
            ("clickhouse_database", &self.clickhouse_database),
            ("clickhouse_history_table", &self.clickhouse_history_table),
        ];

        if let Some((key, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Message(format!(
                "FLEET_{} must be set",
                key.to_uppercase()
            )));
        }
        if self.postgres_max_pool_size == 0 {
            return Err(ConfigError::Message(
                "FLEET_POSTGRES_MAX_POOL_SIZE must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn collect_secret(&self) -> Option<String> {
        non_empty(&self.collect_secret)
    }

    pub fn collect_interval(&self) -> Option<Duration> {
        (self.collect_interval_secs > 0).then(|| Duration::from_secs(self.collect_interval_secs))
    }

    pub fn provider_api_key(&self) -> Option<String> {
        non_empty(&self.provider_api_key)
    }

    pub fn provider_rows_field(&self) -> Option<String> {
        non_empty(&self.provider_rows_field)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

// HTTP defaults
fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_position_stale_after_secs() -> u64 {
    900
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "fleet".to_string()
}

fn default_postgres_username() -> String {
    "fleet".to_string()
}

fn default_postgres_password() -> String {
    "fleet".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    5
}

fn default_postgres_migrations_dir() -> String {
    "/home/fleet/migrations/postgres".to_string()
}

fn default_goose_binary_path() -> String {
    "goose".to_string()
}

// ClickHouse defaults
fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_clickhouse_native_url() -> String {
    "localhost:9000".to_string()
}

fn default_clickhouse_database() -> String {
    "fleet".to_string()
}

fn default_clickhouse_username() -> String {
    "fleet".to_string()
}

fn default_clickhouse_password() -> String {
    "fleet".to_string()
}

fn default_clickhouse_history_table() -> String {
    "vehicle_position_log".to_string()
}

fn default_clickhouse_migrations_dir() -> String {
    "/home/fleet/migrations/clickhouse".to_string()
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "fleet-tracker".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "FLEET_LOG_LEVEL",
        "FLEET_PROVIDER_URL",
        "FLEET_HTTP_PORT",
        "FLEET_COLLECT_SECRET",
        "FLEET_COLLECT_INTERVAL_SECS",
        "FLEET_POSTGRES_HOST",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: Test runs with mutex lock to prevent concurrent env access
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("FLEET_PROVIDER_URL", "https://provider.example/positions");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.http_addr(), "0.0.0.0:8080");
        assert_eq!(config.collect_secret(), None);
        assert_eq!(config.collect_interval(), None);
        assert_eq!(config.position_stale_after_secs, 900);
        assert_eq!(config.clickhouse_history_table, "vehicle_position_log");

        clear_env();
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("FLEET_PROVIDER_URL", "https://provider.example/positions");
            std::env::set_var("FLEET_LOG_LEVEL", "debug");
            std::env::set_var("FLEET_HTTP_PORT", "9090");
            std::env::set_var("FLEET_COLLECT_SECRET", "s3cret");
            std::env::set_var("FLEET_COLLECT_INTERVAL_SECS", "300");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.collect_secret().as_deref(), Some("s3cret"));
        assert_eq!(config.collect_interval(), Some(Duration::from_secs(300)));

        clear_env();
    }

    #[test]
    fn test_missing_provider_url_fails_fast() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        let err = ServiceConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("FLEET_PROVIDER_URL"));
    }

    #[test]
    fn test_blank_required_store_setting_fails_fast() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("FLEET_PROVIDER_URL", "https://provider.example/positions");
            std::env::set_var("FLEET_POSTGRES_HOST", " ");
        }

        let err = ServiceConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("FLEET_POSTGRES_HOST"));

        clear_env();
    }
}

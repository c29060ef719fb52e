pub mod clickhouse;
pub mod domain;
pub mod geo;
pub mod postgres;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockPositionLogRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockTelemetryProvider;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockVehiclePositionRepository;

use crate::domain::result::DomainResult;
use crate::domain::vehicle_position::RawTelemetryRow;
use async_trait::async_trait;

/// Trait for the external fleet telemetry provider
///
/// Implementations should:
/// - Fetch positions for the whole fleet in a single call
/// - Return rows in provider response order
/// - Return `DomainError::ProviderError` if the call or its response is unusable
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Fetch every row the provider currently reports
    async fn fetch_all(&self) -> DomainResult<Vec<RawTelemetryRow>>;
}

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Telemetry provider error: {0}")]
    ProviderError(String),

    #[error("Position cache write failed: {0}")]
    CacheWriteError(String),

    #[error("Position history append failed: {0}")]
    HistoryWriteError(String),

    #[error("Vehicle not found: {query}")]
    VehicleNotFound { query: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

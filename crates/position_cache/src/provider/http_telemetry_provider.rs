use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, RawTelemetryRow, TelemetryProvider};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Longest slice of an error body copied into a `ProviderError`
const ERROR_BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct HttpTelemetryProviderConfig {
    /// Full URL of the bulk-fetch endpoint, query string included
    pub url: String,
    /// Sent as `Authorization: Bearer <key>` when set
    pub api_key: Option<String>,
    /// Field holding the row array; `None` means the body is the array
    pub rows_field: Option<String>,
    pub timeout: Duration,
}

/// Fetches the whole fleet with one GET against the provider
#[derive(Clone)]
pub struct HttpTelemetryProvider {
    client: reqwest::Client,
    config: HttpTelemetryProviderConfig,
}

impl HttpTelemetryProvider {
    pub fn new(config: HttpTelemetryProviderConfig) -> anyhow::Result<Self> {
        if config.url.is_empty() {
            anyhow::bail!("provider url must be set");
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl TelemetryProvider for HttpTelemetryProvider {
    #[instrument(skip(self))]
    async fn fetch_all(&self) -> DomainResult<Vec<RawTelemetryRow>> {
        let mut request = self.client.get(&self.config.url);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "provider request failed");
            DomainError::ProviderError(format!("provider request failed: {e}"))
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            DomainError::ProviderError(format!("failed reading provider response: {e}"))
        })?;

        if !status.is_success() {
            let excerpt: String = String::from_utf8_lossy(&body)
                .chars()
                .take(ERROR_BODY_EXCERPT_CHARS)
                .collect();
            return Err(DomainError::ProviderError(format!(
                "provider responded {status}: {excerpt}"
            )));
        }

        let value: Value = serde_json::from_slice(&body).map_err(|e| {
            DomainError::ProviderError(format!("provider response is not JSON: {e}"))
        })?;

        let rows = extract_rows(value, self.config.rows_field.as_deref())?;
        debug!(row_count = rows.len(), "provider rows fetched");
        Ok(rows)
    }
}

/// Pull the row array out of a decoded provider response.
///
/// A 200 response can still carry an error object (`errorCode` / `errorMsg`),
/// which is reported as a provider failure rather than an empty fleet.
pub fn extract_rows(value: Value, rows_field: Option<&str>) -> DomainResult<Vec<RawTelemetryRow>> {
    if let Some(code) = value.get("errorCode").filter(|code| !code.is_null()) {
        let message = value
            .get("errorMsg")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(DomainError::ProviderError(format!(
            "provider error {code}: {message}"
        )));
    }

    let rows = match (value, rows_field) {
        (Value::Object(mut map), Some(field)) => map.remove(field).ok_or_else(|| {
            DomainError::ProviderError(format!("provider response has no `{field}` field"))
        })?,
        (value, _) => value,
    };

    match rows {
        Value::Array(items) => Ok(items.into_iter().map(RawTelemetryRow::new).collect()),
        other => Err(DomainError::ProviderError(format!(
            "expected an array of rows, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

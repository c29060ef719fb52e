use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};

/// Logging and trace export settings for one service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Reported as the OTel `service.name` resource and the tracer name
    pub service_name: String,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// OTLP gRPC collector; `None` keeps telemetry to the JSON log stream
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>, log_level: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: log_level.into(),
            otlp_endpoint: None,
        }
    }

    /// Export traces and logs to `endpoint`. A blank endpoint leaves export off.
    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.otlp_endpoint = (!endpoint.trim().is_empty()).then_some(endpoint);
        self
    }
}

/// Returned by `init_telemetry` when OTLP export is on; hand back to `shutdown_telemetry`
pub struct TelemetryProviders {
    pub tracer_provider: SdkTracerProvider,
    pub logger_provider: LoggerProvider,
}

mod http_telemetry_provider;

pub use http_telemetry_provider::*;

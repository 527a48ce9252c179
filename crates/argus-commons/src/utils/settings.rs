use std::env;
use std::fs;
use std::path::Path;

use anyhow::Context;
use log::info;
use serde::de::DeserializeOwned;

/// Environment variable naming the telemetry collector endpoint. The
/// original colon-separated key is honoured as a fallback for deployments
/// carrying legacy manifests.
pub const OTEL_ENDPOINT_ENV: &str = "OPENTELEMETRY_COLLECTOR_ENDPOINT";
pub const OTEL_ENDPOINT_ENV_LEGACY: &str = "OpenTelemetry:CollectorEndpoint";

/// Loads a JSON settings file. The path comes from `env_key` when set,
/// otherwise `default_path` is used.
pub fn load_settings<T: DeserializeOwned>(env_key: &str, default_path: &str) -> anyhow::Result<T> {
    let path = env::var(env_key).unwrap_or_else(|_| default_path.to_string());
    load_settings_from_path(&path)
}

pub fn load_settings_from_path<T: DeserializeOwned>(path: impl AsRef<Path>) -> anyhow::Result<T> {
    let path = path.as_ref();
    info!("loading settings from {}", path.display());
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))
}

/// Telemetry collector endpoint, when configured.
pub fn otel_collector_endpoint() -> Option<String> {
    env::var(OTEL_ENDPOINT_ENV)
        .or_else(|_| env::var(OTEL_ENDPOINT_ENV_LEGACY))
        .ok()
        .filter(|value| !value.is_empty())
}

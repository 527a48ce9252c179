use std::time::Duration;

use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

use crate::models::noc_model::NocBehavior;
use crate::utils::circuit_breaker::BreakerSettings;
use crate::utils::duration;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        key,
        reason: reason.into(),
    }
}

fn default_true() -> bool {
    true
}

/// HTTP(S) listener settings, shared by the coordinator ingress and the
/// pupil endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenerSettings {
    pub port: u16,
    #[serde(default)]
    pub use_https: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_password: Option<String>,
    #[serde(default = "ListenerSettings::default_endpoint_path")]
    pub endpoint_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ListenerSettings {
    fn default_endpoint_path() -> String {
        "/api/v1/messages".to_string()
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.port == 0 {
            return Err(invalid("Listener.port", "must be in [1, 65535]"));
        }
        if self.use_https && self.certificate_path.as_deref().unwrap_or("").is_empty() {
            return Err(invalid(
                "Listener.certificatePath",
                "required when useHttps is enabled",
            ));
        }
        if !self.endpoint_path.starts_with('/') {
            return Err(invalid("Listener.endpointPath", "must start with '/'"));
        }
        Ok(())
    }
}

impl Default for ListenerSettings {
    fn default() -> Self {
        ListenerSettings {
            port: 8080,
            use_https: false,
            certificate_path: None,
            certificate_password: None,
            endpoint_path: Self::default_endpoint_path(),
            api_key: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NocClientSettings {
    pub endpoint: String,
    #[serde(default = "NocClientSettings::default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "NocClientSettings::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "NocClientSettings::default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "NocClientSettings::default_retry_multiplier")]
    pub retry_multiplier: f64,
}

impl NocClientSettings {
    fn default_timeout_seconds() -> u64 {
        10
    }

    fn default_max_retries() -> u32 {
        3
    }

    fn default_retry_delay_ms() -> u64 {
        500
    }

    fn default_retry_multiplier() -> f64 {
        2.0
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Delay before retry `attempt` (1-based): `retryDelayMs * retryMultiplier^(attempt-1)`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = self.retry_multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.retry_delay_ms as f64 * factor) as u64)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.endpoint.is_empty() {
            return Err(invalid("NocClient.endpoint", "is required"));
        }
        if self.timeout_seconds < 1 {
            return Err(invalid("NocClient.timeoutSeconds", "must be >= 1"));
        }
        if self.retry_multiplier < 1.0 {
            return Err(invalid("NocClient.retryMultiplier", "must be >= 1.0"));
        }
        Ok(())
    }
}

impl Default for NocClientSettings {
    fn default() -> Self {
        NocClientSettings {
            endpoint: String::new(),
            timeout_seconds: Self::default_timeout_seconds(),
            max_retries: Self::default_max_retries(),
            retry_delay_ms: Self::default_retry_delay_ms(),
            retry_multiplier: Self::default_retry_multiplier(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogSettings {
    #[serde(default = "WatchdogSettings::default_alert_name")]
    pub alert_name: String,
    #[serde(default = "WatchdogSettings::default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "WatchdogSettings::default_normal_grace_period_seconds")]
    pub normal_grace_period_seconds: u64,
    #[serde(default = "WatchdogSettings::default_crash_recovery_grace_period_seconds")]
    pub crash_recovery_grace_period_seconds: u64,
    #[serde(default = "default_true")]
    pub send_to_noc: bool,
    #[serde(default)]
    pub payload: String,
    #[serde(
        default,
        with = "duration::option_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub suppress_window: Option<Duration>,
}

impl WatchdogSettings {
    fn default_alert_name() -> String {
        "Watchdog".to_string()
    }

    fn default_timeout_seconds() -> u64 {
        300
    }

    fn default_normal_grace_period_seconds() -> u64 {
        120
    }

    fn default_crash_recovery_grace_period_seconds() -> u64 {
        15
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn normal_grace_period(&self) -> Duration {
        Duration::from_secs(self.normal_grace_period_seconds)
    }

    pub fn crash_recovery_grace_period(&self) -> Duration {
        Duration::from_secs(self.crash_recovery_grace_period_seconds)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.timeout_seconds < 1 {
            return Err(invalid("Watchdog.timeoutSeconds", "must be >= 1"));
        }
        if self.alert_name.is_empty() {
            return Err(invalid("Watchdog.alertName", "is required"));
        }
        Ok(())
    }
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        WatchdogSettings {
            alert_name: Self::default_alert_name(),
            timeout_seconds: Self::default_timeout_seconds(),
            normal_grace_period_seconds: Self::default_normal_grace_period_seconds(),
            crash_recovery_grace_period_seconds:
                Self::default_crash_recovery_grace_period_seconds(),
            send_to_noc: true,
            payload: String::new(),
            suppress_window: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceSettings {
    #[serde(default = "PersistenceSettings::default_storage_path")]
    pub storage_path: String,
    pub recovery_file_name: String,
}

impl PersistenceSettings {
    fn default_storage_path() -> String {
        "/var/lib/argus-pupil".to_string()
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.recovery_file_name.is_empty() {
            return Err(invalid("Persistence.recoveryFileName", "is required"));
        }
        Ok(())
    }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        PersistenceSettings {
            storage_path: Self::default_storage_path(),
            recovery_file_name: "noc-recovery.json".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandlerSettings {
    #[serde(default = "EventHandlerSettings::default_handler_timeout_seconds")]
    pub handler_timeout_seconds: u64,
    #[serde(default = "EventHandlerSettings::default_max_concurrent_handlers")]
    pub max_concurrent_handlers: usize,
}

impl EventHandlerSettings {
    fn default_handler_timeout_seconds() -> u64 {
        5
    }

    fn default_max_concurrent_handlers() -> usize {
        4
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.handler_timeout_seconds < 1 {
            return Err(invalid("EventHandler.handlerTimeoutSeconds", "must be >= 1"));
        }
        if self.max_concurrent_handlers < 1 {
            return Err(invalid("EventHandler.maxConcurrentHandlers", "must be >= 1"));
        }
        Ok(())
    }
}

impl Default for EventHandlerSettings {
    fn default() -> Self {
        EventHandlerSettings {
            handler_timeout_seconds: Self::default_handler_timeout_seconds(),
            max_concurrent_handlers: Self::default_max_concurrent_handlers(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorSettings {
    #[serde(default = "CoordinatorSettings::default_snapshot_interval_seconds")]
    pub snapshot_interval_seconds: u64,
}

impl CoordinatorSettings {
    fn default_snapshot_interval_seconds() -> u64 {
        15
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_seconds)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.snapshot_interval_seconds < 1 {
            return Err(invalid("Coordinator.snapshotIntervalSeconds", "must be >= 1"));
        }
        Ok(())
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        CoordinatorSettings {
            snapshot_interval_seconds: Self::default_snapshot_interval_seconds(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesSettings {
    #[serde(default = "KubernetesSettings::default_namespace")]
    pub namespace: String,
    #[serde(default = "KubernetesSettings::default_api_timeout_seconds")]
    pub api_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub use_in_cluster_config: bool,
}

impl KubernetesSettings {
    fn default_namespace() -> String {
        "monitoring".to_string()
    }

    fn default_api_timeout_seconds() -> u64 {
        10
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_seconds)
    }
}

impl Default for KubernetesSettings {
    fn default() -> Self {
        KubernetesSettings {
            namespace: Self::default_namespace(),
            api_timeout_seconds: Self::default_api_timeout_seconds(),
            use_in_cluster_config: true,
        }
    }
}

/// One watched pod: how to find it and what to tell NOC per outcome.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodCheckSettings {
    pub label_selector: String,
    pub container_name: String,
    #[serde(default)]
    pub create_noc_behavior: NocBehavior,
    #[serde(default)]
    pub unknown_noc_behavior: NocBehavior,
}

impl PodCheckSettings {
    pub fn validate(&self, key: &'static str) -> Result<(), SettingsError> {
        if self.label_selector.is_empty() {
            return Err(invalid(key, "labelSelector is required"));
        }
        if self.container_name.is_empty() {
            return Err(invalid(key, "containerName is required"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    #[serde(default = "RetrySettings::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "RetrySettings::default_delay_milliseconds")]
    pub delay_milliseconds: Vec<u64>,
}

impl RetrySettings {
    fn default_max_retries() -> u32 {
        2
    }

    fn default_delay_milliseconds() -> Vec<u64> {
        vec![250, 500, 1000]
    }

    /// Delay before retry `attempt` (1-based); the last configured delay
    /// applies to any further attempts.
    pub fn delay(&self, attempt: u32) -> Duration {
        let index = (attempt.saturating_sub(1) as usize).min(self.delay_milliseconds.len().saturating_sub(1));
        Duration::from_millis(self.delay_milliseconds.get(index).copied().unwrap_or(0))
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_retries: Self::default_max_retries(),
            delay_milliseconds: Self::default_delay_milliseconds(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerSettings {
    #[serde(default = "CircuitBreakerSettings::default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "CircuitBreakerSettings::default_open_duration_seconds")]
    pub open_duration_seconds: u64,
    #[serde(default = "CircuitBreakerSettings::default_success_threshold")]
    pub success_threshold: u32,
    #[serde(default = "CircuitBreakerSettings::default_suppressed_log_interval_seconds")]
    pub suppressed_log_interval_seconds: u64,
}

impl CircuitBreakerSettings {
    fn default_failure_threshold() -> u32 {
        3
    }

    fn default_open_duration_seconds() -> u64 {
        30
    }

    fn default_success_threshold() -> u32 {
        2
    }

    fn default_suppressed_log_interval_seconds() -> u64 {
        60
    }

    pub fn to_breaker_settings(&self) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.failure_threshold,
            open_duration: Duration::from_secs(self.open_duration_seconds),
            success_threshold: self.success_threshold,
            suppressed_log_interval: Duration::from_secs(self.suppressed_log_interval_seconds),
        }
    }

    pub fn validate(&self, key: &'static str) -> Result<(), SettingsError> {
        if self.failure_threshold == 0 {
            return Err(invalid(key, "failureThreshold must be >= 1"));
        }
        if self.success_threshold == 0 {
            return Err(invalid(key, "successThreshold must be >= 1"));
        }
        Ok(())
    }
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        CircuitBreakerSettings {
            failure_threshold: Self::default_failure_threshold(),
            open_duration_seconds: Self::default_open_duration_seconds(),
            success_threshold: Self::default_success_threshold(),
            suppressed_log_interval_seconds: Self::default_suppressed_log_interval_seconds(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartTrackingSettings {
    #[serde(default = "RestartTrackingSettings::default_window_size")]
    pub window_size: usize,
    #[serde(default = "RestartTrackingSettings::default_restart_threshold")]
    pub restart_threshold: u32,
    #[serde(default = "RestartTrackingSettings::default_normal_grace_period_seconds")]
    pub normal_grace_period_seconds: u64,
}

impl RestartTrackingSettings {
    fn default_window_size() -> usize {
        5
    }

    fn default_restart_threshold() -> u32 {
        3
    }

    fn default_normal_grace_period_seconds() -> u64 {
        300
    }

    pub fn normal_grace_period(&self) -> Duration {
        Duration::from_secs(self.normal_grace_period_seconds)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.window_size < 2 {
            return Err(invalid(
                "K8sLayer.restartTracking.windowSize",
                "must be >= 2",
            ));
        }
        Ok(())
    }
}

impl Default for RestartTrackingSettings {
    fn default() -> Self {
        RestartTrackingSettings {
            window_size: Self::default_window_size(),
            restart_threshold: Self::default_restart_threshold(),
            normal_grace_period_seconds: Self::default_normal_grace_period_seconds(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct K8sLayerSettings {
    #[serde(default)]
    pub kubernetes: KubernetesSettings,
    pub prometheus_pod: PodCheckSettings,
    pub ksm_pod: PodCheckSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    #[serde(default)]
    pub restart_tracking: RestartTrackingSettings,
    #[serde(default = "K8sLayerSettings::default_polling_interval_seconds")]
    pub polling_interval_seconds: u64,
}

impl K8sLayerSettings {
    fn default_polling_interval_seconds() -> u64 {
        30
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_seconds)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.prometheus_pod.validate("K8sLayer.prometheusPod")?;
        self.ksm_pod.validate("K8sLayer.ksmPod")?;
        self.circuit_breaker.validate("K8sLayer.circuitBreaker")?;
        self.restart_tracking.validate()?;
        if self.polling_interval_seconds < 1 {
            return Err(invalid("K8sLayer.pollingIntervalSeconds", "must be >= 1"));
        }
        Ok(())
    }
}

/// Suppression and duplicate-window settings for the NOC pipeline; all
/// values use the `<n>{s,m,h,d}` duration grammar.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NocSettings {
    #[serde(default = "NocSettings::default_window", with = "duration::string")]
    pub default_window: Duration,
    #[serde(
        default = "NocSettings::default_cleanup_interval",
        with = "duration::string"
    )]
    pub cleanup_interval: Duration,
    #[serde(
        default = "NocSettings::default_duplicate_window",
        with = "duration::string"
    )]
    pub duplicate_window: Duration,
}

impl NocSettings {
    fn default_window() -> Duration {
        Duration::from_secs(600)
    }

    fn default_cleanup_interval() -> Duration {
        Duration::from_secs(60)
    }

    fn default_duplicate_window() -> Duration {
        Duration::from_secs(30)
    }
}

impl Default for NocSettings {
    fn default() -> Self {
        NocSettings {
            default_window: Self::default_window(),
            cleanup_interval: Self::default_cleanup_interval(),
            duplicate_window: Self::default_duplicate_window(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsVectorSettings {
    #[serde(
        default = "AlertsVectorSettings::default_alert_ttl",
        with = "duration::string"
    )]
    pub alert_ttl: Duration,
}

impl AlertsVectorSettings {
    fn default_alert_ttl() -> Duration {
        Duration::from_secs(24 * 3600)
    }
}

impl Default for AlertsVectorSettings {
    fn default() -> Self {
        AlertsVectorSettings {
            alert_ttl: Self::default_alert_ttl(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRetrySettings {
    #[serde(default = "ConnectionRetrySettings::default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "ConnectionRetrySettings::default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "ConnectionRetrySettings::default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "ConnectionRetrySettings::default_cluster_connect_timeout_ms")]
    pub cluster_connect_timeout_ms: u64,
}

impl ConnectionRetrySettings {
    fn default_initial_backoff_ms() -> u64 {
        1000
    }

    fn default_max_backoff_ms() -> u64 {
        30000
    }

    fn default_multiplier() -> f64 {
        2.0
    }

    fn default_cluster_connect_timeout_ms() -> u64 {
        5000
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_backoff_ms as f64 * factor) as u64;
        Duration::from_millis(millis.min(self.max_backoff_ms))
    }

    pub fn cluster_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.cluster_connect_timeout_ms)
    }
}

impl Default for ConnectionRetrySettings {
    fn default() -> Self {
        ConnectionRetrySettings {
            initial_backoff_ms: Self::default_initial_backoff_ms(),
            max_backoff_ms: Self::default_max_backoff_ms(),
            multiplier: Self::default_multiplier(),
            cluster_connect_timeout_ms: Self::default_cluster_connect_timeout_ms(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazelcastSettings {
    #[serde(default = "HazelcastSettings::default_cluster_name")]
    pub cluster_name: String,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default = "HazelcastSettings::default_alerts_map_name")]
    pub alerts_map_name: String,
    #[serde(default = "HazelcastSettings::default_batch_window_ms")]
    pub batch_window_ms: u64,
    #[serde(default = "HazelcastSettings::default_max_write_retries")]
    pub max_write_retries: u32,
    #[serde(default = "HazelcastSettings::default_write_retry_delay_ms")]
    pub write_retry_delay_ms: u64,
    #[serde(default)]
    pub connection_retry: ConnectionRetrySettings,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
    #[serde(default = "HazelcastSettings::default_client_recreate_threshold_ms")]
    pub client_recreate_threshold_ms: u64,
}

impl HazelcastSettings {
    fn default_cluster_name() -> String {
        "argus".to_string()
    }

    fn default_alerts_map_name() -> String {
        "argus-alerts".to_string()
    }

    fn default_batch_window_ms() -> u64 {
        2000
    }

    fn default_max_write_retries() -> u32 {
        3
    }

    fn default_write_retry_delay_ms() -> u64 {
        200
    }

    fn default_client_recreate_threshold_ms() -> u64 {
        60000
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    /// Linearly increasing delay before write retry `attempt` (1-based).
    pub fn write_retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.write_retry_delay_ms * attempt as u64)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.alerts_map_name.is_empty() {
            return Err(invalid("Hazelcast.alertsMapName", "is required"));
        }
        if self.batch_window_ms == 0 {
            return Err(invalid("Hazelcast.batchWindowMs", "must be >= 1"));
        }
        self.circuit_breaker.validate("Hazelcast.circuitBreaker")?;
        Ok(())
    }
}

impl Default for HazelcastSettings {
    fn default() -> Self {
        HazelcastSettings {
            cluster_name: Self::default_cluster_name(),
            addresses: Vec::new(),
            alerts_map_name: Self::default_alerts_map_name(),
            batch_window_ms: Self::default_batch_window_ms(),
            max_write_retries: Self::default_max_write_retries(),
            write_retry_delay_ms: Self::default_write_retry_delay_ms(),
            connection_retry: ConnectionRetrySettings::default(),
            circuit_breaker: CircuitBreakerSettings::default(),
            client_recreate_threshold_ms: Self::default_client_recreate_threshold_ms(),
        }
    }
}

/// Full coordinator configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgusSettings {
    #[serde(default)]
    pub listener: ListenerSettings,
    pub noc_client: NocClientSettings,
    #[serde(default)]
    pub watchdog: WatchdogSettings,
    #[serde(default)]
    pub coordinator: CoordinatorSettings,
    pub k8s_layer: K8sLayerSettings,
    #[serde(default)]
    pub noc: NocSettings,
    #[serde(default)]
    pub alerts_vector: AlertsVectorSettings,
    #[serde(default)]
    pub hazelcast: HazelcastSettings,
}

impl ArgusSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.listener.validate()?;
        self.noc_client.validate()?;
        self.watchdog.validate()?;
        self.coordinator.validate()?;
        self.k8s_layer.validate()?;
        self.hazelcast.validate()?;
        Ok(())
    }
}

/// Full pupil sidecar configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PupilSettings {
    #[serde(default)]
    pub listener: ListenerSettings,
    pub noc_client: NocClientSettings,
    #[serde(default)]
    pub watchdog: WatchdogSettings,
    #[serde(default)]
    pub persistence: PersistenceSettings,
    #[serde(default)]
    pub event_handler: EventHandlerSettings,
}

impl PupilSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.listener.validate()?;
        self.noc_client.validate()?;
        self.watchdog.validate()?;
        self.persistence.validate()?;
        self.event_handler.validate()?;
        Ok(())
    }
}

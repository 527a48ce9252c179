use std::sync::{
    Arc,
    Mutex,
};
use std::time::{
    Duration,
    Instant,
};

use argus_commons::models::push_model::PushAlert;
use argus_commons::models::settings_model::ArgusSettings;
use argus_commons::utils::correlation::{
    correlation_id,
    execution_id,
};
use argus_k8s::{
    K8sLayerService,
    LayerState,
};
use argus_metrics::Metrics;
use argus_noc::NocSnapshotService;
use argus_vector::AlertsVector;
use chrono::{
    DateTime,
    Utc,
};
use log::{
    debug,
    info,
};
use tokio::sync::Notify;
use tokio::time::sleep;

use crate::watchdog::WatchdogService;

pub const PLATFORM_FILTER: &str = "argus";

/// Top-level scheduler: fans the three alert sources into the vector and
/// drives the snapshot cadence through the boot state machine.
pub struct Coordinator {
    settings: ArgusSettings,
    vector: Arc<AlertsVector>,
    watchdog: Arc<WatchdogService>,
    k8s: Arc<K8sLayerService>,
    snapshot: Arc<NocSnapshotService>,
    metrics: Arc<Metrics>,
    shutdown: Arc<Notify>,
    last_alert_received_at: Mutex<Option<DateTime<Utc>>>,
    last_layer_state: Mutex<Option<LayerState>>,
}

impl Coordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: ArgusSettings, vector: Arc<AlertsVector>, watchdog: Arc<WatchdogService>,
        k8s: Arc<K8sLayerService>, snapshot: Arc<NocSnapshotService>, metrics: Arc<Metrics>,
        shutdown: Arc<Notify>,
    ) -> Self {
        Coordinator {
            settings,
            vector,
            watchdog,
            k8s,
            snapshot,
            metrics,
            shutdown,
            last_alert_received_at: Mutex::new(None),
            last_layer_state: Mutex::new(None),
        }
    }

    /// Boot. Crash recovery reconciles NOC synchronously before any timer
    /// starts; a normal boot holds snapshots back for the grace period.
    pub async fn start(self: &Arc<Self>) {
        if self.vector.crash_recovery() {
            info!("crash-recovery boot: reconciling NOC state");
            let poll_corr = correlation_id("poll");
            self.poll_once(&poll_corr).await;
            let snapshot_corr = correlation_id("snapshot");
            self.snapshot.take_crash_recovery_snapshot(&snapshot_corr);

            self.watchdog.start();
            self.metrics.set_grace_period_active(false);
            self.spawn_poll_loop(self.settings.k8s_layer.polling_interval());
            self.spawn_snapshot_loop(Duration::ZERO);
        } else {
            info!(
                "normal boot: first snapshot in {}s",
                self.settings.watchdog.normal_grace_period_seconds
            );
            self.watchdog.start();
            self.metrics.set_grace_period_active(true);
            self.spawn_poll_loop(Duration::ZERO);
            self.spawn_snapshot_loop(self.settings.watchdog.normal_grace_period());
        }
    }

    /// Push-source ingestion. Only `platform=argus` alerts pass; a firing
    /// alert carrying the configured watchdog name becomes a heartbeat.
    pub fn receive_alerts(&self, alerts: Vec<PushAlert>, correlation_id: &str) {
        *self.last_alert_received_at.lock().unwrap() = Some(Utc::now());

        for push in alerts {
            self.metrics.inc_received();

            if !push.platform().eq_ignore_ascii_case(PLATFORM_FILTER) {
                debug!(
                    "[{correlation_id}] filtered alert {:?} from platform {:?}",
                    push.name(),
                    push.platform()
                );
                self.metrics.inc_filtered();
                continue;
            }

            if push.name() == self.settings.watchdog.alert_name && push.is_firing() {
                self.watchdog.record_heartbeat(correlation_id);
                continue;
            }

            let execution_id = execution_id();
            self.vector.update_alert(push.to_alert(&execution_id));
        }
    }

    pub fn last_alert_received_at(&self) -> Option<DateTime<Utc>> {
        *self.last_alert_received_at.lock().unwrap()
    }

    pub fn last_layer_state(&self) -> Option<LayerState> {
        self.last_layer_state.lock().unwrap().clone()
    }

    /// One K8s polling cycle; both emitted alerts share one execution ID.
    pub async fn poll_once(&self, correlation_id: &str) {
        let started = Instant::now();
        let execution_id = execution_id();

        let state = self.k8s.get_state(correlation_id).await;
        let alerts = self.k8s.generate_alerts(&state, &execution_id);
        for alert in alerts {
            self.vector.update_alert(alert);
        }

        *self.last_layer_state.lock().unwrap() = Some(state);
        self.metrics.observe_k8s_poll_duration(started.elapsed());
    }

    fn spawn_poll_loop(self: &Arc<Self>, initial_delay: Duration) {
        let coordinator = Arc::clone(self);
        let interval = self.settings.k8s_layer.polling_interval();
        tokio::spawn(async move {
            if !initial_delay.is_zero() {
                tokio::select! {
                    _ = sleep(initial_delay) => {}
                    _ = coordinator.shutdown.notified() => return,
                }
            }
            loop {
                let corr = correlation_id("poll");
                coordinator.poll_once(&corr).await;
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = coordinator.shutdown.notified() => {
                        info!("k8s poll loop stopping");
                        return;
                    }
                }
            }
        });
    }

    fn spawn_snapshot_loop(self: &Arc<Self>, initial_delay: Duration) {
        let coordinator = Arc::clone(self);
        let interval = self.settings.coordinator.snapshot_interval();
        tokio::spawn(async move {
            if !initial_delay.is_zero() {
                // Grace period: no snapshots until it lapses.
                tokio::select! {
                    _ = sleep(initial_delay) => {}
                    _ = coordinator.shutdown.notified() => return,
                }
            }
            loop {
                let corr = correlation_id("snapshot");
                coordinator.snapshot.take_snapshot(&corr);
                coordinator.metrics.set_grace_period_active(false);
                tokio::select! {
                    _ = sleep(interval) => {}
                    _ = coordinator.shutdown.notified() => {
                        info!("snapshot loop stopping");
                        return;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use argus_commons::models::alert_model::AlertStatus;
    use argus_commons::models::settings_model::{
        AlertsVectorSettings,
        K8sLayerSettings,
        PodCheckSettings,
        RetrySettings,
        WatchdogSettings,
    };
    use argus_commons::utils::circuit_breaker::{
        BreakerSettings,
        CircuitBreaker,
    };
    use argus_k8s::client::{
        GuardedPodClient,
        PodLister,
    };
    use argus_k8s::pod_health::PodHealthChecker;
    use argus_k8s::RestartTracker;
    use argus_noc::NocQueue;
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::Pod;

    use super::*;

    struct EmptyLister;

    #[async_trait]
    impl PodLister for EmptyLister {
        async fn list_pods(
            &self, _namespace: &str, _label_selector: &str,
        ) -> Result<Vec<Pod>, argus_k8s::K8sError> {
            Ok(vec![])
        }
    }

    fn settings() -> ArgusSettings {
        let raw = r#"{
            "nocClient": {"endpoint": "https://noc.example.com"},
            "watchdog": {"alertName": "ArgusWatchdog", "normalGracePeriodSeconds": 0},
            "k8sLayer": {
                "prometheusPod": {"labelSelector": "app=prometheus", "containerName": "prometheus"},
                "ksmPod": {"labelSelector": "app=ksm", "containerName": "ksm"}
            }
        }"#;
        serde_json::from_str(raw).expect("settings")
    }

    fn coordinator() -> (Arc<Coordinator>, Arc<AlertsVector>, Arc<NocQueue>) {
        let settings = settings();
        let metrics = Arc::new(Metrics::new());
        let vector = Arc::new(AlertsVector::new(
            &AlertsVectorSettings::default(),
            metrics.clone(),
        ));
        let watchdog = Arc::new(WatchdogService::new(
            WatchdogSettings {
                alert_name: "ArgusWatchdog".to_string(),
                ..WatchdogSettings::default()
            },
            vector.clone(),
            false,
        ));

        let breaker = Arc::new(CircuitBreaker::new("kubernetes", BreakerSettings::default()));
        let client = Arc::new(GuardedPodClient::new(
            Arc::new(EmptyLister),
            breaker.clone(),
            RetrySettings {
                max_retries: 0,
                delay_milliseconds: vec![1],
            },
            Duration::from_secs(1),
            "monitoring",
        ));
        let tracker = Arc::new(RestartTracker::new(Default::default(), false));
        let k8s = Arc::new(K8sLayerService::new(
            PodHealthChecker::new(client, tracker),
            K8sLayerSettings {
                prometheus_pod: PodCheckSettings {
                    label_selector: "app=prometheus".to_string(),
                    container_name: "prometheus".to_string(),
                    ..PodCheckSettings::default()
                },
                ksm_pod: PodCheckSettings {
                    label_selector: "app=ksm".to_string(),
                    container_name: "ksm".to_string(),
                    ..PodCheckSettings::default()
                },
                ..K8sLayerSettings::default()
            },
            breaker,
            metrics.clone(),
        ));

        let queue = Arc::new(NocQueue::new(Duration::from_secs(30), metrics.clone()));
        let snapshot = Arc::new(NocSnapshotService::new(
            vector.clone(),
            queue.clone(),
            metrics.clone(),
        ));

        let coordinator = Arc::new(Coordinator::new(
            settings,
            vector.clone(),
            watchdog,
            k8s,
            snapshot,
            metrics,
            Arc::new(Notify::new()),
        ));
        (coordinator, vector, queue)
    }

    fn push(labels: &[(&str, &str)], status: &str) -> PushAlert {
        PushAlert {
            status: Some(status.to_string()),
            send_to_noc: None,
            suppress_window: None,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            annotations: HashMap::new(),
            starts_at: Utc::now(),
            ends_at: None,
            generator_url: None,
        }
    }

    #[tokio::test]
    async fn test_platform_filter_drops_foreign_alerts() {
        let (coordinator, vector, _) = coordinator();

        coordinator.receive_alerts(
            vec![push(&[("alertname", "X"), ("platform", "other")], "firing")],
            "push-00000001",
        );

        let snapshot = coordinator.metrics.snapshot();
        assert_eq!(snapshot.received, 1);
        assert_eq!(snapshot.filtered, 1);
        assert!(vector.is_empty(), "filtered alerts never reach the vector");
    }

    #[tokio::test]
    async fn test_platform_filter_is_case_insensitive() {
        let (coordinator, vector, _) = coordinator();
        coordinator.receive_alerts(
            vec![push(&[("alertname", "X"), ("platform", "Argus")], "firing")],
            "push-00000002",
        );
        assert_eq!(vector.len(), 1);
    }

    #[tokio::test]
    async fn test_watchdog_named_firing_alert_becomes_heartbeat() {
        let (coordinator, vector, _) = coordinator();
        coordinator.receive_alerts(
            vec![push(
                &[("alertname", "ArgusWatchdog"), ("platform", "argus")],
                "firing",
            )],
            "push-00000003",
        );

        let alert = vector
            .get_alert(argus_commons::models::alert_model::FINGERPRINT_WATCHDOG)
            .expect("watchdog marker");
        assert_eq!(alert.status, AlertStatus::Ignore);
        assert_eq!(vector.len(), 1, "heartbeat does not insert the push alert");
    }

    #[tokio::test]
    async fn test_resolved_watchdog_alert_routes_normally() {
        let (coordinator, vector, _) = coordinator();
        coordinator.receive_alerts(
            vec![push(
                &[("alertname", "ArgusWatchdog"), ("platform", "argus")],
                "resolved",
            )],
            "push-00000004",
        );
        // A non-firing CANCEL for an unseen fingerprint is dropped silently.
        assert!(vector
            .get_alert(argus_commons::models::alert_model::FINGERPRINT_WATCHDOG)
            .is_none());
        assert!(vector.is_empty());
    }

    #[tokio::test]
    async fn test_poll_once_inserts_both_layer_alerts() {
        let (coordinator, vector, _) = coordinator();
        coordinator.poll_once("poll-00000001").await;

        assert_eq!(vector.len(), 2);
        let prometheus = vector
            .get_alert(argus_commons::models::alert_model::FINGERPRINT_PROMETHEUS_LAYER)
            .expect("prometheus layer alert");
        let ksm = vector
            .get_alert(argus_commons::models::alert_model::FINGERPRINT_KSM_LAYER)
            .expect("ksm layer alert");
        // No pods in the fake cluster: both checks come back Down -> CREATE.
        assert_eq!(prometheus.status, AlertStatus::Create);
        assert_eq!(ksm.status, AlertStatus::Create);
        assert_eq!(
            prometheus.execution_id, ksm.execution_id,
            "one execution ID per poll"
        );
        assert!(coordinator.last_layer_state().is_some());
    }
}

use std::sync::Arc;

use argus_commons::models::alert_model::{
    Alert,
    AlertStatus,
    FINGERPRINT_KSM_LAYER,
    FINGERPRINT_PROMETHEUS_LAYER,
    PRIORITY_KSM_DOWN,
    PRIORITY_PROMETHEUS_DOWN,
};
use argus_commons::models::noc_model::NocBehavior;
use argus_commons::models::settings_model::{
    K8sLayerSettings,
    PodCheckSettings,
};
use argus_commons::utils::circuit_breaker::{
    BreakerState,
    CircuitBreaker,
};
use argus_metrics::{
    Metrics,
    BREAKER_KUBERNETES,
};
use chrono::Utc;
use log::info;

use crate::pod_health::PodHealthChecker;
use crate::models::{
    LayerState,
    PodHealth,
};

pub const SOURCE_K8S_POLL: &str = "k8s_poll";

/// Polls the Prometheus and KSM pods, derives the combined layer status and
/// produces the two layer alerts of every cycle.
pub struct K8sLayerService {
    checker: PodHealthChecker,
    settings: K8sLayerSettings,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<Metrics>,
}

impl K8sLayerService {
    pub fn new(
        checker: PodHealthChecker, settings: K8sLayerSettings, breaker: Arc<CircuitBreaker>,
        metrics: Arc<Metrics>,
    ) -> Self {
        K8sLayerService {
            checker,
            settings,
            breaker,
            metrics,
        }
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    pub async fn get_state(&self, correlation_id: &str) -> LayerState {
        let (prometheus, ksm) = tokio::join!(
            self.checker.check(&self.settings.prometheus_pod),
            self.checker.check(&self.settings.ksm_pod),
        );
        let state = LayerState::derive(prometheus, ksm);
        self.metrics
            .set_breaker_state(BREAKER_KUBERNETES, self.breaker.state().as_gauge());
        info!(
            "[{correlation_id}] k8s layer status {:?} (prometheus: {:?}, ksm: {:?})",
            state.status, state.prometheus, state.ksm
        );
        state
    }

    /// Every poll emits exactly two alerts, one per watched pod, with the
    /// reserved fingerprints and priorities.
    pub fn generate_alerts(&self, state: &LayerState, execution_id: &str) -> [Alert; 2] {
        [
            self.pod_alert(
                FINGERPRINT_PROMETHEUS_LAYER,
                PRIORITY_PROMETHEUS_DOWN,
                &state.prometheus,
                &self.settings.prometheus_pod,
                execution_id,
            ),
            self.pod_alert(
                FINGERPRINT_KSM_LAYER,
                PRIORITY_KSM_DOWN,
                &state.ksm,
                &self.settings.ksm_pod,
                execution_id,
            ),
        ]
    }

    fn pod_alert(
        &self, fingerprint: &str, priority: i64, health: &PodHealth, check: &PodCheckSettings,
        execution_id: &str,
    ) -> Alert {
        let (status, behavior) = match health {
            PodHealth::Healthy => (AlertStatus::Ignore, None),
            PodHealth::Unknown(_) => (AlertStatus::Unknown, Some(&check.unknown_noc_behavior)),
            PodHealth::Down(_) | PodHealth::Unstable(_) => {
                (AlertStatus::Create, Some(&check.create_noc_behavior))
            }
        };
        let behavior = behavior.cloned().unwrap_or_else(NocBehavior::default);

        let now = Utc::now();
        Alert {
            priority,
            name: fingerprint.to_string(),
            summary: match health {
                PodHealth::Healthy => format!("{fingerprint} is healthy"),
                _ => health.reason().to_string(),
            },
            description: health.reason().to_string(),
            payload: behavior.payload,
            source: SOURCE_K8S_POLL.to_string(),
            fingerprint: fingerprint.to_string(),
            status,
            send_to_noc: behavior.send_to_noc,
            suppress_window: behavior.suppress_window,
            timestamp: now,
            last_seen: now,
            annotations: Default::default(),
            execution_id: execution_id.to_string(),
            prometheus: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use argus_commons::models::settings_model::{
        RestartTrackingSettings,
        RetrySettings,
    };
    use argus_commons::utils::circuit_breaker::{
        BreakerSettings,
        CircuitBreaker,
    };
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::Pod;

    use crate::client::{
        GuardedPodClient,
        PodLister,
    };
    use crate::error::K8sError;
    use crate::restart_tracker::RestartTracker;

    use super::*;

    struct EmptyLister;

    #[async_trait]
    impl PodLister for EmptyLister {
        async fn list_pods(
            &self, _namespace: &str, _label_selector: &str,
        ) -> Result<Vec<Pod>, K8sError> {
            Ok(vec![])
        }
    }

    fn service() -> K8sLayerService {
        let settings = K8sLayerSettings {
            prometheus_pod: PodCheckSettings {
                label_selector: "app=prometheus".to_string(),
                container_name: "prometheus".to_string(),
                create_noc_behavior: NocBehavior {
                    send_to_noc: true,
                    payload: "prom-create".to_string(),
                    suppress_window: Some(Duration::from_secs(300)),
                },
                unknown_noc_behavior: NocBehavior {
                    send_to_noc: false,
                    payload: "prom-unknown".to_string(),
                    suppress_window: None,
                },
            },
            ksm_pod: PodCheckSettings {
                label_selector: "app=ksm".to_string(),
                container_name: "ksm".to_string(),
                ..PodCheckSettings::default()
            },
            ..K8sLayerSettings::default()
        };
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
        let tracker = Arc::new(RestartTracker::new(
            RestartTrackingSettings::default(),
            false,
        ));
        K8sLayerService::new(
            PodHealthChecker::new(client, tracker),
            settings,
            breaker,
            Arc::new(Metrics::new()),
        )
    }

    #[test]
    fn test_generate_alerts_down_maps_to_create_with_behavior() {
        let service = service();
        let state = LayerState::derive(
            PodHealth::Down("prometheus gone".to_string()),
            PodHealth::Healthy,
        );
        let [prometheus, ksm] = service.generate_alerts(&state, "exec-00000001");

        assert_eq!(prometheus.fingerprint, FINGERPRINT_PROMETHEUS_LAYER);
        assert_eq!(prometheus.priority, PRIORITY_PROMETHEUS_DOWN);
        assert_eq!(prometheus.status, AlertStatus::Create);
        assert!(prometheus.send_to_noc);
        assert_eq!(prometheus.payload, "prom-create");
        assert_eq!(
            prometheus.suppress_window,
            Some(Duration::from_secs(300))
        );
        assert_eq!(prometheus.execution_id, "exec-00000001");

        assert_eq!(ksm.fingerprint, FINGERPRINT_KSM_LAYER);
        assert_eq!(ksm.priority, PRIORITY_KSM_DOWN);
        assert_eq!(ksm.status, AlertStatus::Ignore);
    }

    #[test]
    fn test_generate_alerts_unknown_uses_unknown_behavior() {
        let service = service();
        let state = LayerState::derive(
            PodHealth::Unknown("Kubernetes API unavailable".to_string()),
            PodHealth::Healthy,
        );
        let [prometheus, _] = service.generate_alerts(&state, "exec-00000002");
        assert_eq!(prometheus.status, AlertStatus::Unknown);
        assert!(!prometheus.send_to_noc);
        assert_eq!(prometheus.payload, "prom-unknown");
    }

    #[tokio::test]
    async fn test_get_state_with_missing_pods_is_critical() {
        let service = service();
        let state = service.get_state("poll-00000001").await;
        assert!(matches!(state.prometheus, PodHealth::Down(_)));
        assert_eq!(state.status, crate::models::LayerStatus::Critical);
    }
}

use std::sync::Arc;

use argus_commons::models::settings_model::PodCheckSettings;
use k8s_openapi::api::core::v1::Pod;
use log::warn;

use crate::client::GuardedPodClient;
use crate::models::PodHealth;
use crate::restart_tracker::RestartTracker;

pub const REASON_API_UNAVAILABLE: &str = "Kubernetes API unavailable";

/// Six-step liveness check: pod exists, phase Running, not terminating,
/// container ready, container running, restart-stable.
pub struct PodHealthChecker {
    client: Arc<GuardedPodClient>,
    tracker: Arc<RestartTracker>,
}

impl PodHealthChecker {
    pub fn new(client: Arc<GuardedPodClient>, tracker: Arc<RestartTracker>) -> Self {
        PodHealthChecker { client, tracker }
    }

    pub async fn check(&self, check: &PodCheckSettings) -> PodHealth {
        let pods = match self.client.list_pods(&check.label_selector).await {
            Ok(pods) => pods,
            Err(e) => {
                warn!(
                    "pod check for {} could not list pods: {e}",
                    check.label_selector
                );
                return PodHealth::Unknown(REASON_API_UNAVAILABLE.to_string());
            }
        };
        self.evaluate(&pods, check)
    }

    fn evaluate(&self, pods: &[Pod], check: &PodCheckSettings) -> PodHealth {
        let pod = match pods.first() {
            Some(pod) => pod,
            None => {
                return PodHealth::Down(format!(
                    "no pod matches selector {}",
                    check.label_selector
                ))
            }
        };
        let pod_name = pod.metadata.name.as_deref().unwrap_or("<unnamed>");

        let phase = pod
            .status
            .as_ref()
            .and_then(|status| status.phase.as_deref())
            .unwrap_or("");
        if phase != "Running" {
            return PodHealth::Down(format!("pod {pod_name} phase is {phase:?}"));
        }

        if pod.metadata.deletion_timestamp.is_some() {
            return PodHealth::Down(format!("pod {pod_name} is terminating"));
        }

        let container = pod
            .status
            .as_ref()
            .and_then(|status| status.container_statuses.as_ref())
            .and_then(|statuses| {
                statuses
                    .iter()
                    .find(|status| status.name == check.container_name)
            });
        let container = match container {
            Some(container) => container,
            None => {
                return PodHealth::Down(format!(
                    "container {} not found in pod {pod_name}",
                    check.container_name
                ))
            }
        };

        if !container.ready {
            return PodHealth::Down(format!(
                "container {} in pod {pod_name} is not ready",
                check.container_name
            ));
        }

        let running = container
            .state
            .as_ref()
            .map(|state| state.running.is_some())
            .unwrap_or(false);
        if !running {
            let detail = container
                .state
                .as_ref()
                .and_then(|state| state.waiting.as_ref())
                .and_then(|waiting| waiting.reason.clone())
                .unwrap_or_else(|| "not running".to_string());
            return PodHealth::Down(format!(
                "container {} in pod {pod_name} is {detail}",
                check.container_name
            ));
        }

        let observation = self
            .tracker
            .observe(pod_name, container.restart_count.max(0) as u32);
        if !observation.stable {
            return PodHealth::Unstable(format!(
                "pod {pod_name} restarted {} time(s) within the tracking window",
                observation.restarts_in_window
            ));
        }

        PodHealth::Healthy
    }
}

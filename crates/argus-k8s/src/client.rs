use std::sync::Arc;
use std::time::Duration;

use argus_commons::models::settings_model::{
    KubernetesSettings,
    RetrySettings,
};
use argus_commons::utils::circuit_breaker::CircuitBreaker;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{
    Api,
    Client,
    Config,
};
use log::{
    debug,
    error,
    info,
    warn,
};
use tokio::time::{
    sleep,
    timeout,
};

use crate::error::K8sError;

/// Seam over the pod listing so the health checker can be exercised
/// without a cluster.
#[async_trait]
pub trait PodLister: Send + Sync {
    async fn list_pods(&self, namespace: &str, label_selector: &str)
        -> Result<Vec<Pod>, K8sError>;
}

pub struct KubePodLister {
    client: Client,
}

impl KubePodLister {
    pub async fn new(settings: &KubernetesSettings) -> Result<Self, K8sError> {
        let config = if settings.use_in_cluster_config {
            Config::incluster().map_err(|e| K8sError::Config(e.to_string()))?
        } else {
            Config::infer()
                .await
                .map_err(|e| K8sError::Config(e.to_string()))?
        };
        let client = Client::try_from(config).map_err(K8sError::Api)?;
        info!(
            "Kubernetes client ready (namespace {}, in-cluster: {})",
            settings.namespace, settings.use_in_cluster_config
        );
        Ok(KubePodLister { client })
    }
}

#[async_trait]
impl PodLister for KubePodLister {
    async fn list_pods(
        &self, namespace: &str, label_selector: &str,
    ) -> Result<Vec<Pod>, K8sError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let listing = pods
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(listing.items)
    }
}

/// Pod listing guarded by the Kubernetes circuit breaker, with a per-call
/// timeout and the configured retry ladder.
pub struct GuardedPodClient {
    lister: Arc<dyn PodLister>,
    breaker: Arc<CircuitBreaker>,
    retry: RetrySettings,
    api_timeout: Duration,
    namespace: String,
}

impl GuardedPodClient {
    pub fn new(
        lister: Arc<dyn PodLister>, breaker: Arc<CircuitBreaker>, retry: RetrySettings,
        api_timeout: Duration, namespace: impl Into<String>,
    ) -> Self {
        GuardedPodClient {
            lister,
            breaker,
            retry,
            api_timeout,
            namespace: namespace.into(),
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub async fn list_pods(&self, label_selector: &str) -> Result<Vec<Pod>, K8sError> {
        if !self.breaker.is_allowed() {
            if self.breaker.should_log() {
                warn!("skipping Kubernetes call for {label_selector}: circuit breaker open");
            }
            return Err(K8sError::CircuitOpen);
        }

        let total_attempts = 1 + self.retry.max_retries;
        let mut last_error = String::new();

        for attempt in 1..=total_attempts {
            let call = self.lister.list_pods(&self.namespace, label_selector);
            match timeout(self.api_timeout, call).await {
                Ok(Ok(pods)) => {
                    self.breaker.record_success();
                    debug!(
                        "listed {} pod(s) for selector {label_selector} (attempt {attempt})",
                        pods.len()
                    );
                    return Ok(pods);
                }
                Ok(Err(e)) => {
                    last_error = e.to_string();
                }
                Err(_) => {
                    last_error = K8sError::Timeout(self.api_timeout).to_string();
                }
            }

            if attempt < total_attempts {
                let delay = self.retry.delay(attempt);
                debug!(
                    "Kubernetes call for {label_selector} failed (attempt {attempt}/{total_attempts}): {last_error}; retrying in {delay:?}"
                );
                sleep(delay).await;
            }
        }

        self.breaker.record_failure();
        if self.breaker.should_log() {
            error!(
                "Kubernetes call for {label_selector} failed after {total_attempts} attempts: {last_error}"
            );
        }
        Err(K8sError::RetriesExhausted {
            attempts: total_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{
        AtomicU32,
        Ordering,
    };

    use argus_commons::utils::circuit_breaker::{
        BreakerSettings,
        BreakerState,
    };

    use super::*;

    struct FlakyLister {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl PodLister for FlakyLister {
        async fn list_pods(
            &self, _namespace: &str, _label_selector: &str,
        ) -> Result<Vec<Pod>, K8sError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(K8sError::Config("connection refused".to_string()))
            } else {
                Ok(vec![Pod::default()])
            }
        }
    }

    fn client_with(lister: Arc<dyn PodLister>, max_retries: u32) -> GuardedPodClient {
        GuardedPodClient::new(
            lister,
            Arc::new(CircuitBreaker::new("kubernetes", BreakerSettings {
                failure_threshold: 2,
                open_duration: Duration::from_secs(60),
                success_threshold: 1,
                suppressed_log_interval: Duration::from_secs(60),
            })),
            RetrySettings {
                max_retries,
                delay_milliseconds: vec![1],
            },
            Duration::from_secs(1),
            "monitoring",
        )
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let lister = Arc::new(FlakyLister {
            calls: AtomicU32::new(0),
            fail_first: 2,
        });
        let client = client_with(lister.clone(), 2);

        let pods = client.list_pods("app=prometheus").await.expect("pods");
        assert_eq!(pods.len(), 1);
        assert_eq!(lister.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_record_breaker_failure() {
        let lister = Arc::new(FlakyLister {
            calls: AtomicU32::new(0),
            fail_first: u32::MAX,
        });
        let client = client_with(lister, 1);

        assert!(matches!(
            client.list_pods("app=prometheus").await,
            Err(K8sError::RetriesExhausted { attempts: 2, .. })
        ));
        assert_eq!(client.breaker().state(), BreakerState::Closed);

        // Second exhausted call crosses the failure threshold of two.
        let _ = client.list_pods("app=prometheus").await;
        assert_eq!(client.breaker().state(), BreakerState::Open);

        // While open the call is refused without touching the lister.
        assert!(matches!(
            client.list_pods("app=prometheus").await,
            Err(K8sError::CircuitOpen)
        ));
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use argus_commons::models::alert_model::Alert;
use argus_commons::models::settings_model::HazelcastSettings;
use argus_commons::utils::circuit_breaker::CircuitBreaker;
use argus_metrics::{
    Metrics,
    BREAKER_HAZELCAST,
};
use log::{
    error,
    info,
    warn,
};
use tokio::time::sleep;

use crate::map::DistributedMap;

/// Result of one batch operation. `persisted` holds the keys that made it
/// to L2; the batch stops at the first key whose retries are exhausted.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub persisted: Vec<String>,
    pub complete: bool,
}

/// Write-behind persistence to the distributed map, guarded by the L2
/// circuit breaker. Values are JSON-serialised alerts keyed by fingerprint.
pub struct AlertsPersistence {
    map: Arc<dyn DistributedMap>,
    breaker: Arc<CircuitBreaker>,
    settings: HazelcastSettings,
    metrics: Arc<Metrics>,
}

impl AlertsPersistence {
    pub fn new(
        map: Arc<dyn DistributedMap>, breaker: Arc<CircuitBreaker>, settings: HazelcastSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        AlertsPersistence {
            map,
            breaker,
            settings,
            metrics,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Boot-time load. Runs unconditionally (no circuit check); an
    /// unreachable store or empty map yields an empty result, and records
    /// that fail to decode are logged and skipped.
    pub async fn load_all(&self) -> HashMap<String, Alert> {
        let entries = match self.map.entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("L2 load failed, booting with an empty vector: {e}");
                return HashMap::new();
            }
        };

        let mut alerts = HashMap::with_capacity(entries.len());
        for (fingerprint, raw) in entries {
            match serde_json::from_str::<Alert>(&raw) {
                Ok(alert) => {
                    alerts.insert(fingerprint, alert);
                }
                Err(e) => {
                    warn!("skipping corrupt L2 record for {fingerprint}: {e}");
                }
            }
        }
        info!("loaded {} alert(s) from L2", alerts.len());
        alerts
    }

    pub async fn save_batch(&self, alerts: &HashMap<String, Alert>) -> BatchOutcome {
        self.run_batch(alerts.iter().collect::<Vec<_>>(), |key, alert| {
            let map = self.map.clone();
            let value = serde_json::to_string(alert);
            let key = key.to_string();
            async move {
                match value {
                    Ok(encoded) => map.set(&key, &encoded).await.map_err(|e| e.to_string()),
                    Err(e) => Err(format!("failed to encode alert {key}: {e}")),
                }
            }
        })
        .await
    }

    pub async fn remove_batch(&self, fingerprints: &[String]) -> BatchOutcome {
        if fingerprints.is_empty() {
            return BatchOutcome {
                persisted: Vec::new(),
                complete: true,
            };
        }
        if !self.breaker.is_allowed() {
            if self.breaker.should_log() {
                warn!("skipping L2 remove batch: circuit breaker open");
            }
            return BatchOutcome::default();
        }

        let mut outcome = BatchOutcome {
            persisted: Vec::new(),
            complete: true,
        };
        for fingerprint in fingerprints {
            if self
                .write_with_retries(fingerprint, || {
                    let map = self.map.clone();
                    let key = fingerprint.clone();
                    async move { map.remove(&key).await.map_err(|e| e.to_string()) }
                })
                .await
            {
                outcome.persisted.push(fingerprint.clone());
            } else {
                outcome.complete = false;
                break;
            }
        }
        self.finish_batch(&outcome);
        outcome
    }

    async fn run_batch<F, Fut>(&self, items: Vec<(&String, &Alert)>, mut op: F) -> BatchOutcome
    where
        F: FnMut(&String, &Alert) -> Fut,
        Fut: std::future::Future<Output = Result<(), String>>,
    {
        if items.is_empty() {
            return BatchOutcome {
                persisted: Vec::new(),
                complete: true,
            };
        }
        if !self.breaker.is_allowed() {
            if self.breaker.should_log() {
                warn!("skipping L2 save batch: circuit breaker open");
            }
            return BatchOutcome::default();
        }

        let mut outcome = BatchOutcome {
            persisted: Vec::new(),
            complete: true,
        };
        for (fingerprint, alert) in items {
            let attempt_op = || op(fingerprint, alert);
            if self.write_with_retries(fingerprint, attempt_op).await {
                outcome.persisted.push(fingerprint.clone());
            } else {
                outcome.complete = false;
                break;
            }
        }
        self.finish_batch(&outcome);
        outcome
    }

    /// One key with linearly growing retry delays. Returns whether the
    /// write eventually succeeded.
    async fn write_with_retries<F, Fut>(&self, fingerprint: &str, mut op: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<(), String>>,
    {
        let total_attempts = 1 + self.settings.max_write_retries;
        let mut last_error = String::new();

        for attempt in 1..=total_attempts {
            match op().await {
                Ok(()) => return true,
                Err(e) => last_error = e,
            }
            if attempt < total_attempts {
                sleep(self.settings.write_retry_delay(attempt)).await;
            }
        }

        if self.breaker.should_log() {
            error!("L2 write for {fingerprint} failed after {total_attempts} attempts: {last_error}");
        }
        false
    }

    fn finish_batch(&self, outcome: &BatchOutcome) {
        if outcome.complete {
            self.breaker.record_success();
            self.metrics.inc_l2_write_success();
            self.metrics.set_l2_available(true);
        } else {
            self.breaker.record_failure();
            self.metrics.inc_l2_write_failure();
            self.metrics.set_l2_available(false);
        }
        self.metrics
            .set_breaker_state(BREAKER_HAZELCAST, self.breaker.state().as_gauge());
    }
}

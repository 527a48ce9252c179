use std::sync::Arc;
use std::time::Instant;

use argus_commons::models::alert_model::{
    Alert,
    AlertStatus,
};
use argus_commons::models::noc_model::NocDecision;
use argus_metrics::Metrics;
use argus_vector::AlertsVector;
use chrono::Utc;
use log::{
    debug,
    info,
};

use crate::queue::NocQueue;

/// Reads the vector and turns it into NOC decisions. Only the single
/// highest-priority CREATE (and the first UNKNOWN) leaves per cycle;
/// remaining CREATEs wait for later snapshots. NOC reporting is serial on
/// purpose.
pub struct NocSnapshotService {
    vector: Arc<AlertsVector>,
    queue: Arc<NocQueue>,
    metrics: Arc<Metrics>,
}

impl NocSnapshotService {
    pub fn new(vector: Arc<AlertsVector>, queue: Arc<NocQueue>, metrics: Arc<Metrics>) -> Self {
        NocSnapshotService {
            vector,
            queue,
            metrics,
        }
    }

    pub fn take_snapshot(&self, correlation_id: &str) {
        let started = Instant::now();
        let evicted = self.vector.cleanup_expired_alerts();
        if evicted > 0 {
            debug!("[{correlation_id}] snapshot evicted {evicted} expired alert(s)");
        }

        let snapshot = self.vector.get_snapshot();
        self.update_gauges(&snapshot);
        let taken_at = Utc::now();

        if let Some(create) = snapshot
            .iter()
            .find(|alert| alert.status == AlertStatus::Create)
        {
            if self.queue.was_recently_enqueued(&create.fingerprint) {
                debug!(
                    "[{correlation_id}] CREATE {} already enqueued recently",
                    create.fingerprint
                );
            } else {
                self.queue.enqueue(NocDecision::HandleCreate {
                    alert: create.clone(),
                    taken_at,
                    correlation_id: correlation_id.to_string(),
                });
                self.queue.mark_as_enqueued(&create.fingerprint);
            }
        }

        if let Some(unknown) = snapshot
            .iter()
            .find(|alert| alert.status == AlertStatus::Unknown)
        {
            if !self.queue.was_recently_enqueued(&unknown.fingerprint) {
                self.queue.enqueue(NocDecision::HandleUnknown {
                    alert: unknown.clone(),
                    taken_at,
                    correlation_id: correlation_id.to_string(),
                });
                self.queue.mark_as_enqueued(&unknown.fingerprint);
            }
        }

        let cancels: Vec<Alert> = snapshot
            .iter()
            .filter(|alert| {
                alert.status == AlertStatus::Cancel
                    && !self.queue.was_recently_enqueued(&alert.fingerprint)
            })
            .cloned()
            .collect();
        if !cancels.is_empty() {
            for cancel in &cancels {
                self.queue.mark_as_enqueued(&cancel.fingerprint);
            }
            self.queue.enqueue(NocDecision::HandleCancels {
                alerts: cancels,
                taken_at,
                correlation_id: correlation_id.to_string(),
            });
        }

        self.metrics.observe_snapshot_duration(started.elapsed());
    }

    /// Crash-recovery boot path, used exactly once: everything that might
    /// have reached NOC before the crash is cancelled, and the live sources
    /// re-create whatever they still claim.
    pub fn take_crash_recovery_snapshot(&self, correlation_id: &str) {
        let snapshot = self.vector.get_snapshot();
        self.update_gauges(&snapshot);
        let taken_at = Utc::now();

        let mut cancels = Vec::new();
        for alert in snapshot {
            if alert.status == AlertStatus::Ignore {
                continue;
            }
            let mut cancel = alert;
            cancel.status = AlertStatus::Cancel;
            cancel.summary = format!("[CRASH RECOVERY] {}", cancel.summary);
            // Rewrite the live entry too, so the worker's re-read sees the
            // CANCEL it is about to dispatch.
            self.vector.update_alert(cancel.clone());
            cancels.push(cancel);
        }

        info!(
            "[{correlation_id}] crash-recovery snapshot cancels {} alert(s)",
            cancels.len()
        );
        if !cancels.is_empty() {
            for cancel in &cancels {
                self.queue.mark_as_enqueued(&cancel.fingerprint);
            }
            self.queue.enqueue(NocDecision::HandleCancels {
                alerts: cancels,
                taken_at,
                correlation_id: correlation_id.to_string(),
            });
        }
    }

    fn update_gauges(&self, snapshot: &[Alert]) {
        self.metrics.set_vector_size(snapshot.len() as i64);
        for status in [
            AlertStatus::Create,
            AlertStatus::Cancel,
            AlertStatus::Ignore,
            AlertStatus::Unknown,
        ] {
            let count = snapshot
                .iter()
                .filter(|alert| alert.status == status)
                .count();
            self.metrics
                .set_vector_status_count(status.as_str(), count as i64);
        }
        self.metrics.set_noc_queue_depth(self.queue.queue_depth());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use argus_commons::models::settings_model::AlertsVectorSettings;

    use super::*;

    fn fixture() -> (Arc<AlertsVector>, Arc<NocQueue>, NocSnapshotService) {
        let metrics = Arc::new(Metrics::new());
        let vector = Arc::new(AlertsVector::new(
            &AlertsVectorSettings {
                alert_ttl: Duration::from_secs(3600),
            },
            metrics.clone(),
        ));
        let queue = Arc::new(NocQueue::new(Duration::from_secs(30), metrics.clone()));
        let service = NocSnapshotService::new(vector.clone(), queue.clone(), metrics);
        (vector, queue, service)
    }

    fn alert(fingerprint: &str, status: AlertStatus, priority: i64) -> Alert {
        Alert::new(fingerprint, fingerprint, status, priority)
    }

    #[tokio::test]
    async fn test_snapshot_enqueues_only_highest_priority_create() {
        let (vector, queue, service) = fixture();
        vector.update_alert(alert("fp-low", AlertStatus::Create, 10));
        vector.update_alert(alert("fp-high", AlertStatus::Create, -3));

        service.take_snapshot("snapshot-00000001");
        assert_eq!(queue.queue_depth(), 1);

        match queue.dequeue().await.unwrap() {
            NocDecision::HandleCreate { alert, .. } => {
                assert_eq!(alert.fingerprint, "fp-high");
            }
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_snapshot_skips_recently_enqueued_create() {
        let (vector, queue, service) = fixture();
        vector.update_alert(alert("fp-a", AlertStatus::Create, 1));

        service.take_snapshot("snapshot-00000001");
        service.take_snapshot("snapshot-00000002");
        assert_eq!(
            queue.queue_depth(),
            1,
            "duplicate window keeps the second snapshot from re-enqueuing"
        );
    }

    #[tokio::test]
    async fn test_snapshot_batches_cancels() {
        let (vector, queue, service) = fixture();
        vector.update_alert(alert("fp-a", AlertStatus::Create, 1));
        vector.update_alert(alert("fp-b", AlertStatus::Create, 2));
        vector.update_alert(alert("fp-a", AlertStatus::Cancel, 1));
        vector.update_alert(alert("fp-b", AlertStatus::Cancel, 2));

        service.take_snapshot("snapshot-00000001");
        assert_eq!(queue.queue_depth(), 1);
        match queue.dequeue().await.unwrap() {
            NocDecision::HandleCancels { alerts, .. } => assert_eq!(alerts.len(), 2),
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_snapshot_evicts_expired_creates() {
        let metrics = Arc::new(Metrics::new());
        let vector = Arc::new(AlertsVector::new(
            &AlertsVectorSettings {
                alert_ttl: Duration::from_secs(0),
            },
            metrics.clone(),
        ));
        let queue = Arc::new(NocQueue::new(Duration::from_secs(30), metrics.clone()));
        let service = NocSnapshotService::new(vector.clone(), queue.clone(), metrics);

        vector.update_alert(alert("fp-a", AlertStatus::Create, 1));
        std::thread::sleep(Duration::from_millis(5));
        service.take_snapshot("snapshot-00000001");

        assert!(vector.is_empty(), "TTL-expired CREATE evicted at snapshot");
        assert_eq!(queue.queue_depth(), 0);
    }

    #[tokio::test]
    async fn test_crash_recovery_snapshot_rewrites_to_cancels() {
        let (vector, queue, service) = fixture();
        vector.update_alert(alert("fp-create", AlertStatus::Create, 5));
        let mut ignored = alert("fp-ignore", AlertStatus::Ignore, 0);
        ignored.summary = "quiet".to_string();
        vector.update_alert(ignored);
        vector.update_alert(alert("fp-unknown", AlertStatus::Unknown, 3));

        service.take_crash_recovery_snapshot("snapshot-00000001");

        assert_eq!(queue.queue_depth(), 1, "one batch only");
        match queue.dequeue().await.unwrap() {
            NocDecision::HandleCancels { alerts, .. } => {
                assert_eq!(alerts.len(), 2, "IGNORE entries are filtered out");
                for cancel in &alerts {
                    assert_eq!(cancel.status, AlertStatus::Cancel);
                    assert!(cancel.summary.starts_with("[CRASH RECOVERY]"));
                }
            }
            other => panic!("unexpected decision {other:?}"),
        }

        // The live entries were rewritten so the worker's re-read holds.
        assert_eq!(
            vector.get_alert("fp-create").unwrap().status,
            AlertStatus::Cancel
        );
        assert_eq!(
            vector.get_alert("fp-ignore").unwrap().status,
            AlertStatus::Ignore
        );
    }
}

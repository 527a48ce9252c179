use std::sync::Arc;
use std::time::Duration;

use argus_commons::models::alert_model::{
    Alert,
    AlertStatus,
};
use argus_commons::models::noc_model::{
    NocDecision,
    NocMessage,
};
use argus_metrics::Metrics;
use argus_vector::AlertsVector;
use log::{
    debug,
    error,
    info,
};
use tokio::sync::Notify;
use tokio::time::interval;

use crate::client::NocTransport;
use crate::queue::NocQueue;
use crate::suppression::SuppressionCache;

/// Drains the decision FIFO one entry per iteration and dispatches to NOC.
/// Every dispatch re-reads the vector first so a decision taken from a
/// stale snapshot never acts on an alert that has since moved on.
pub struct NocWorker {
    queue: Arc<NocQueue>,
    vector: Arc<AlertsVector>,
    suppression: Arc<SuppressionCache>,
    transport: Arc<dyn NocTransport>,
    metrics: Arc<Metrics>,
    cleanup_interval: Duration,
    shutdown: Arc<Notify>,
}

impl NocWorker {
    pub fn new(
        queue: Arc<NocQueue>, vector: Arc<AlertsVector>, suppression: Arc<SuppressionCache>,
        transport: Arc<dyn NocTransport>, metrics: Arc<Metrics>, cleanup_interval: Duration,
        shutdown: Arc<Notify>,
    ) -> Self {
        NocWorker {
            queue,
            vector,
            suppression,
            transport,
            metrics,
            cleanup_interval,
            shutdown,
        }
    }

    pub async fn run(&self) {
        info!(
            "NOC worker started (cleanup every {:?})",
            self.cleanup_interval
        );
        let mut cleanup = interval(self.cleanup_interval);
        cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        cleanup.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("NOC worker stopping; undispatched decisions are re-derived after restart");
                    break;
                }
                _ = cleanup.tick() => {
                    self.queue.evict_stale_marks();
                    self.suppression.cleanup();
                }
                decision = self.queue.dequeue() => {
                    match decision {
                        Some(decision) => self.dispatch(decision).await,
                        None => break,
                    }
                }
            }
        }
    }

    pub async fn dispatch(&self, decision: NocDecision) {
        match decision {
            NocDecision::HandleCreate {
                alert,
                correlation_id,
                ..
            } => self.handle_create(&alert, &correlation_id).await,
            NocDecision::HandleUnknown {
                alert,
                correlation_id,
                ..
            } => self.handle_unknown(&alert, &correlation_id).await,
            NocDecision::HandleCancels {
                alerts,
                correlation_id,
                ..
            } => self.handle_cancels(&alerts, &correlation_id).await,
        }
    }

    async fn handle_create(&self, queued: &Alert, correlation_id: &str) {
        let alert = match self.reread(queued, AlertStatus::Create) {
            Some(alert) => alert,
            None => return,
        };

        if self.suppression.should_suppress(&alert) {
            debug!(
                "[{correlation_id}] suppressing CREATE for {}",
                alert.fingerprint
            );
            self.metrics.inc_noc_suppressed();
            return;
        }

        if !alert.send_to_noc {
            // Keeps the suppression bookkeeping honest for silent alerts.
            self.suppression.mark_as_sent(&alert);
            return;
        }

        match self
            .transport
            .post(&NocMessage::from_alert(&alert, correlation_id))
            .await
        {
            Ok(()) => {
                self.suppression.mark_as_sent(&alert);
                self.metrics.inc_noc_sent();
                info!(
                    "[{correlation_id}] sent CREATE for {} to NOC",
                    alert.fingerprint
                );
            }
            Err(e) => {
                self.metrics.inc_noc_post_failure();
                error!(
                    "[{correlation_id}] NOC POST for {} failed: {e}",
                    alert.fingerprint
                );
            }
        }
    }

    async fn handle_unknown(&self, queued: &Alert, correlation_id: &str) {
        let alert = match self.reread(queued, AlertStatus::Unknown) {
            Some(alert) => alert,
            None => return,
        };

        if self.suppression.should_suppress(&alert) {
            self.metrics.inc_noc_suppressed();
            return;
        }

        if alert.send_to_noc {
            match self
                .transport
                .post(&NocMessage::from_alert(&alert, correlation_id))
                .await
            {
                Ok(()) => {
                    self.suppression.mark_as_sent(&alert);
                    self.metrics.inc_noc_sent();
                }
                Err(e) => {
                    self.metrics.inc_noc_post_failure();
                    error!(
                        "[{correlation_id}] NOC POST for {} failed: {e}",
                        alert.fingerprint
                    );
                    return;
                }
            }
        } else {
            self.suppression.mark_as_sent(&alert);
        }

        // UNKNOWN is one-shot: once reported it leaves the vector.
        self.vector.remove_alert(&alert.fingerprint);
    }

    async fn handle_cancels(&self, queued: &[Alert], correlation_id: &str) {
        let current: Vec<Alert> = queued
            .iter()
            .filter_map(|alert| self.reread(alert, AlertStatus::Cancel))
            .collect();
        if current.is_empty() {
            return;
        }

        let (send, skip): (Vec<&Alert>, Vec<&Alert>) =
            current.iter().partition(|alert| alert.send_to_noc);
        if !skip.is_empty() {
            debug!(
                "[{correlation_id}] {} CANCEL(s) skipped by sendToNoc",
                skip.len()
            );
        }

        if !send.is_empty() {
            let messages: Vec<NocMessage> = send
                .iter()
                .map(|alert| NocMessage::from_alert(alert, correlation_id))
                .collect();
            match self.transport.post_batch(&messages).await {
                Ok(()) => {
                    for _ in &send {
                        self.metrics.inc_noc_sent();
                    }
                    info!(
                        "[{correlation_id}] sent {} CANCEL(s) to NOC",
                        send.len()
                    );
                }
                Err(e) => {
                    // The vector is still cleaned below: L2 and the next
                    // poll re-derive anything that still matters.
                    self.metrics.inc_noc_post_failure();
                    error!("[{correlation_id}] NOC CANCEL batch failed: {e}");
                }
            }
        }

        for alert in &current {
            self.vector.remove_alert(&alert.fingerprint);
        }
    }

    /// Decision payloads are point-in-time copies; dispatch only proceeds
    /// when the live entry still carries the expected status.
    fn reread(&self, queued: &Alert, expected: AlertStatus) -> Option<Alert> {
        match self.vector.get_alert(&queued.fingerprint) {
            Some(alert) if alert.status == expected => Some(alert),
            Some(alert) => {
                debug!(
                    "skipping {} decision for {}: status is now {:?}",
                    expected.as_str(),
                    queued.fingerprint,
                    alert.status
                );
                None
            }
            None => {
                debug!(
                    "skipping {} decision for {}: no longer in the vector",
                    expected.as_str(),
                    queued.fingerprint
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use argus_commons::models::settings_model::AlertsVectorSettings;
    use chrono::Utc;

    use crate::client::MockNocTransport;

    use super::*;

    fn fixture(transport: MockNocTransport) -> (Arc<AlertsVector>, Arc<NocQueue>, NocWorker) {
        let metrics = Arc::new(Metrics::new());
        let vector = Arc::new(AlertsVector::new(
            &AlertsVectorSettings {
                alert_ttl: Duration::from_secs(3600),
            },
            metrics.clone(),
        ));
        let queue = Arc::new(NocQueue::new(Duration::from_secs(30), metrics.clone()));
        let worker = NocWorker::new(
            queue.clone(),
            vector.clone(),
            Arc::new(SuppressionCache::new(Duration::from_secs(600))),
            Arc::new(transport),
            metrics,
            Duration::from_secs(60),
            Arc::new(Notify::new()),
        );
        (vector, queue, worker)
    }

    fn create_decision(alert: &Alert) -> NocDecision {
        NocDecision::HandleCreate {
            alert: alert.clone(),
            taken_at: Utc::now(),
            correlation_id: "snapshot-00000001".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_posts_once_then_suppresses() {
        let mut transport = MockNocTransport::new();
        transport.expect_post().times(1).returning(|_| Ok(()));

        let (vector, _, worker) = fixture(transport);
        let alert = Alert::new("fp-a", "X", AlertStatus::Create, 5);
        let alert = {
            let mut alert = alert;
            alert.send_to_noc = true;
            alert
        };
        vector.update_alert(alert.clone());

        worker.dispatch(create_decision(&alert)).await;
        // Second dispatch inside the window is suppressed, not posted.
        worker.dispatch(create_decision(&alert)).await;

        let snapshot = worker.metrics.snapshot();
        assert_eq!(snapshot.noc_sent, 1);
        assert_eq!(snapshot.noc_suppressed, 1);
    }

    #[tokio::test]
    async fn test_create_skipped_when_status_changed() {
        let mut transport = MockNocTransport::new();
        transport.expect_post().times(0);

        let (vector, _, worker) = fixture(transport);
        let mut alert = Alert::new("fp-a", "X", AlertStatus::Create, 5);
        alert.send_to_noc = true;
        vector.update_alert(alert.clone());

        // Flip the status before the worker gets to the decision.
        let mut cancelled = alert.clone();
        cancelled.status = AlertStatus::Cancel;
        vector.update_alert(cancelled);

        worker.dispatch(create_decision(&alert)).await;
        assert_eq!(worker.metrics.snapshot().noc_sent, 0);
    }

    #[tokio::test]
    async fn test_create_send_to_noc_false_marks_without_posting() {
        let mut transport = MockNocTransport::new();
        transport.expect_post().times(0);

        let (vector, _, worker) = fixture(transport);
        let mut alert = Alert::new("fp-a", "X", AlertStatus::Create, 5);
        alert.send_to_noc = false;
        vector.update_alert(alert.clone());

        worker.dispatch(create_decision(&alert)).await;
        assert_eq!(worker.metrics.snapshot().noc_sent, 0);
        assert!(
            worker.suppression.should_suppress(&alert),
            "silent alerts still enter the suppression window"
        );
    }

    #[tokio::test]
    async fn test_post_failure_leaves_suppression_clear() {
        let mut transport = MockNocTransport::new();
        transport
            .expect_post()
            .returning(|_| Err(crate::client::NocError::Status(500)));

        let (vector, _, worker) = fixture(transport);
        let mut alert = Alert::new("fp-a", "X", AlertStatus::Create, 5);
        alert.send_to_noc = true;
        vector.update_alert(alert.clone());

        worker.dispatch(create_decision(&alert)).await;

        let snapshot = worker.metrics.snapshot();
        assert_eq!(snapshot.noc_sent, 0);
        assert_eq!(snapshot.noc_post_failure, 1);
        assert!(
            !worker.suppression.should_suppress(&alert),
            "failed POSTs must not start a suppression window"
        );
    }

    #[tokio::test]
    async fn test_unknown_is_one_shot() {
        let mut transport = MockNocTransport::new();
        transport.expect_post().times(1).returning(|_| Ok(()));

        let (vector, _, worker) = fixture(transport);
        let mut alert = Alert::new("fp-u", "X", AlertStatus::Unknown, 5);
        alert.send_to_noc = true;
        vector.update_alert(alert.clone());

        worker
            .dispatch(NocDecision::HandleUnknown {
                alert: alert.clone(),
                taken_at: Utc::now(),
                correlation_id: "snapshot-00000002".to_string(),
            })
            .await;

        assert!(
            vector.get_alert("fp-u").is_none(),
            "UNKNOWN leaves the vector after dispatch"
        );
    }

    #[tokio::test]
    async fn test_cancels_partition_and_always_remove() {
        let mut transport = MockNocTransport::new();
        transport
            .expect_post_batch()
            .times(1)
            .withf(|messages| messages.len() == 1 && messages[0].name == "send-me")
            .returning(|_| Ok(()));

        let (vector, _, worker) = fixture(transport);
        let mut sendable = Alert::new("fp-send", "send-me", AlertStatus::Create, 5);
        sendable.send_to_noc = true;
        let mut silent = Alert::new("fp-skip", "skip-me", AlertStatus::Create, 5);
        silent.send_to_noc = false;
        vector.update_alert(sendable.clone());
        vector.update_alert(silent.clone());

        sendable.status = AlertStatus::Cancel;
        silent.status = AlertStatus::Cancel;
        vector.update_alert(sendable.clone());
        vector.update_alert(silent.clone());

        worker
            .dispatch(NocDecision::HandleCancels {
                alerts: vec![sendable, silent],
                taken_at: Utc::now(),
                correlation_id: "snapshot-00000003".to_string(),
            })
            .await;

        assert!(vector.is_empty(), "every still-CANCEL alert is removed");
    }
}

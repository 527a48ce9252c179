use std::collections::HashMap;
use std::time::Duration;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use serde::Serialize;

pub const BREAKER_KUBERNETES: &str = "kubernetes";
pub const BREAKER_HAZELCAST: &str = "hazelcast";

const DECISION_KINDS: [&str; 3] = ["create", "unknown", "cancels"];
const STATUSES: [&str; 4] = ["CREATE", "CANCEL", "IGNORE", "UNKNOWN"];
const BREAKERS: [&str; 2] = [BREAKER_KUBERNETES, BREAKER_HAZELCAST];

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct StatusLabels {
    status: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct BreakerLabels {
    breaker: String,
}

/// Process-wide metrics facade. Counters and gauges are atomic; histograms
/// delegate to the prometheus-client primitive. The exporter that ships
/// these to the telemetry pipeline is an external collaborator; `encode_text`
/// serves the compatibility `/metrics` surface.
pub struct Metrics {
    registry: Registry,

    received: Counter,
    filtered: Counter,
    created: Counter,
    resolved: Counter,
    unknown: Counter,
    noc_decisions: Family<KindLabels, Counter>,
    noc_sent: Counter,
    noc_suppressed: Counter,
    noc_post_failure: Counter,
    invalid_requests: Counter,
    l2_write_success: Counter,
    l2_write_failure: Counter,
    ttl_evicted: Counter,

    vector_size: Gauge,
    vector_by_status: Family<StatusLabels, Gauge>,
    noc_queue_depth: Gauge,
    circuit_breaker_state: Family<BreakerLabels, Gauge>,
    grace_period_active: Gauge,
    l2_available: Gauge,

    k8s_poll_duration: Histogram,
    snapshot_duration: Histogram,
}

/// Plain numeric view of every counter and gauge, served by the status
/// endpoints and used in tests.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub received: u64,
    pub filtered: u64,
    pub created: u64,
    pub resolved: u64,
    pub unknown: u64,
    pub noc_decisions: HashMap<String, u64>,
    pub noc_sent: u64,
    pub noc_suppressed: u64,
    pub noc_post_failure: u64,
    pub invalid_requests: u64,
    pub l2_write_success: u64,
    pub l2_write_failure: u64,
    pub ttl_evicted: u64,
    pub vector_size: i64,
    pub vector_by_status: HashMap<String, i64>,
    pub noc_queue_depth: i64,
    pub circuit_breaker_state: HashMap<String, i64>,
    pub grace_period_active: bool,
    pub l2_available: bool,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("argus");

        let received = Counter::default();
        registry.register("alerts_received", "Alerts received from all sources", received.clone());
        let filtered = Counter::default();
        registry.register("alerts_filtered", "Alerts dropped by the platform filter", filtered.clone());
        let created = Counter::default();
        registry.register("alerts_created", "Vector entries created or flipped to a new status", created.clone());
        let resolved = Counter::default();
        registry.register("alerts_resolved", "Vector entries removed", resolved.clone());
        let unknown = Counter::default();
        registry.register("alerts_unknown", "Alerts ingested with UNKNOWN status", unknown.clone());

        let noc_decisions = Family::<KindLabels, Counter>::default();
        registry.register("noc_decisions", "NOC decisions enqueued by kind", noc_decisions.clone());
        let noc_sent = Counter::default();
        registry.register("noc_sent", "Messages posted to NOC", noc_sent.clone());
        let noc_suppressed = Counter::default();
        registry.register("noc_suppressed", "Dispatches skipped by the suppression window", noc_suppressed.clone());
        let noc_post_failure = Counter::default();
        registry.register("noc_post_failure", "Definitive NOC POST failures", noc_post_failure.clone());
        let invalid_requests = Counter::default();
        registry.register("invalid_requests", "Ingress requests rejected as malformed", invalid_requests.clone());

        let l2_write_success = Counter::default();
        registry.register("l2_write_success", "Successful L2 batch writes", l2_write_success.clone());
        let l2_write_failure = Counter::default();
        registry.register("l2_write_failure", "Failed L2 batch writes", l2_write_failure.clone());
        let ttl_evicted = Counter::default();
        registry.register("ttl_evicted", "CREATE entries evicted by TTL", ttl_evicted.clone());

        let vector_size = Gauge::default();
        registry.register("vector_size", "Entries currently in the alerts vector", vector_size.clone());
        let vector_by_status = Family::<StatusLabels, Gauge>::default();
        registry.register("vector_by_status", "Vector entries by status", vector_by_status.clone());
        let noc_queue_depth = Gauge::default();
        registry.register("noc_queue_depth", "Decisions waiting in the NOC queue", noc_queue_depth.clone());
        let circuit_breaker_state = Family::<BreakerLabels, Gauge>::default();
        registry.register(
            "circuit_breaker_state",
            "Breaker state (0 closed, 1 half-open, 2 open)",
            circuit_breaker_state.clone(),
        );
        let grace_period_active = Gauge::default();
        registry.register("grace_period_active", "Whether the boot grace period is active", grace_period_active.clone());
        let l2_available = Gauge::default();
        registry.register("l2_available", "Whether the L2 store accepted the last write", l2_available.clone());

        let k8s_poll_duration =
            Histogram::new([0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0].into_iter());
        registry.register("k8s_poll_duration_seconds", "Wall time of one K8s poll", k8s_poll_duration.clone());
        let snapshot_duration =
            Histogram::new([0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0].into_iter());
        registry.register("snapshot_duration_seconds", "Wall time of one snapshot", snapshot_duration.clone());

        Metrics {
            registry,
            received,
            filtered,
            created,
            resolved,
            unknown,
            noc_decisions,
            noc_sent,
            noc_suppressed,
            noc_post_failure,
            invalid_requests,
            l2_write_success,
            l2_write_failure,
            ttl_evicted,
            vector_size,
            vector_by_status,
            noc_queue_depth,
            circuit_breaker_state,
            grace_period_active,
            l2_available,
            k8s_poll_duration,
            snapshot_duration,
        }
    }

    pub fn inc_received(&self) {
        self.received.inc();
    }

    pub fn inc_filtered(&self) {
        self.filtered.inc();
    }

    pub fn inc_created(&self) {
        self.created.inc();
    }

    pub fn inc_resolved(&self) {
        self.resolved.inc();
    }

    pub fn inc_unknown(&self) {
        self.unknown.inc();
    }

    pub fn inc_noc_decision(&self, kind: &str) {
        self.noc_decisions
            .get_or_create(&KindLabels {
                kind: kind.to_string(),
            })
            .inc();
    }

    pub fn inc_noc_sent(&self) {
        self.noc_sent.inc();
    }

    pub fn inc_noc_suppressed(&self) {
        self.noc_suppressed.inc();
    }

    pub fn inc_noc_post_failure(&self) {
        self.noc_post_failure.inc();
    }

    pub fn inc_invalid_requests(&self) {
        self.invalid_requests.inc();
    }

    pub fn inc_l2_write_success(&self) {
        self.l2_write_success.inc();
    }

    pub fn inc_l2_write_failure(&self) {
        self.l2_write_failure.inc();
    }

    pub fn inc_ttl_evicted_by(&self, count: u64) {
        self.ttl_evicted.inc_by(count);
    }

    pub fn set_vector_size(&self, size: i64) {
        self.vector_size.set(size);
    }

    pub fn set_vector_status_count(&self, status: &str, count: i64) {
        self.vector_by_status
            .get_or_create(&StatusLabels {
                status: status.to_string(),
            })
            .set(count);
    }

    pub fn set_noc_queue_depth(&self, depth: i64) {
        self.noc_queue_depth.set(depth);
    }

    pub fn set_breaker_state(&self, breaker: &str, state: i64) {
        self.circuit_breaker_state
            .get_or_create(&BreakerLabels {
                breaker: breaker.to_string(),
            })
            .set(state);
    }

    pub fn set_grace_period_active(&self, active: bool) {
        self.grace_period_active.set(active as i64);
    }

    pub fn set_l2_available(&self, available: bool) {
        self.l2_available.set(available as i64);
    }

    pub fn observe_k8s_poll_duration(&self, elapsed: Duration) {
        self.k8s_poll_duration.observe(elapsed.as_secs_f64());
    }

    pub fn observe_snapshot_duration(&self, elapsed: Duration) {
        self.snapshot_duration.observe(elapsed.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let noc_decisions = DECISION_KINDS
            .iter()
            .map(|kind| {
                let value = self
                    .noc_decisions
                    .get_or_create(&KindLabels {
                        kind: kind.to_string(),
                    })
                    .get();
                (kind.to_string(), value)
            })
            .collect();
        let vector_by_status = STATUSES
            .iter()
            .map(|status| {
                let value = self
                    .vector_by_status
                    .get_or_create(&StatusLabels {
                        status: status.to_string(),
                    })
                    .get();
                (status.to_string(), value)
            })
            .collect();
        let circuit_breaker_state = BREAKERS
            .iter()
            .map(|breaker| {
                let value = self
                    .circuit_breaker_state
                    .get_or_create(&BreakerLabels {
                        breaker: breaker.to_string(),
                    })
                    .get();
                (breaker.to_string(), value)
            })
            .collect();

        MetricsSnapshot {
            received: self.received.get(),
            filtered: self.filtered.get(),
            created: self.created.get(),
            resolved: self.resolved.get(),
            unknown: self.unknown.get(),
            noc_decisions,
            noc_sent: self.noc_sent.get(),
            noc_suppressed: self.noc_suppressed.get(),
            noc_post_failure: self.noc_post_failure.get(),
            invalid_requests: self.invalid_requests.get(),
            l2_write_success: self.l2_write_success.get(),
            l2_write_failure: self.l2_write_failure.get(),
            ttl_evicted: self.ttl_evicted.get(),
            vector_size: self.vector_size.get(),
            vector_by_status,
            noc_queue_depth: self.noc_queue_depth.get(),
            circuit_breaker_state,
            grace_period_active: self.grace_period_active.get() != 0,
            l2_available: self.l2_available.get() != 0,
        }
    }

    /// Prometheus text exposition for the deprecated `/metrics` route.
    pub fn encode_text(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            log::error!("failed to encode metrics registry: {e}");
        }
        buffer
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_show_up_in_snapshot() {
        let metrics = Metrics::new();
        metrics.inc_received();
        metrics.inc_received();
        metrics.inc_filtered();
        metrics.inc_noc_decision("create");
        metrics.inc_noc_sent();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.filtered, 1);
        assert_eq!(snapshot.noc_decisions["create"], 1);
        assert_eq!(snapshot.noc_decisions["cancels"], 0);
        assert_eq!(snapshot.noc_sent, 1);
    }

    #[test]
    fn test_gauges_show_up_in_snapshot() {
        let metrics = Metrics::new();
        metrics.set_vector_size(7);
        metrics.set_vector_status_count("CREATE", 3);
        metrics.set_breaker_state(BREAKER_KUBERNETES, 2);
        metrics.set_grace_period_active(true);
        metrics.set_l2_available(true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.vector_size, 7);
        assert_eq!(snapshot.vector_by_status["CREATE"], 3);
        assert_eq!(snapshot.circuit_breaker_state[BREAKER_KUBERNETES], 2);
        assert!(snapshot.grace_period_active);
        assert!(snapshot.l2_available);
    }

    #[test]
    fn test_text_encoding_contains_prefixed_names() {
        let metrics = Metrics::new();
        metrics.inc_received();
        metrics.observe_snapshot_duration(Duration::from_millis(3));

        let text = metrics.encode_text();
        assert!(text.contains("argus_alerts_received_total"), "{text}");
        assert!(text.contains("argus_snapshot_duration_seconds"), "{text}");
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let metrics = Metrics::new();
        metrics.set_noc_queue_depth(4);
        let value = serde_json::to_value(metrics.snapshot()).expect("encode");
        assert_eq!(value["nocQueueDepth"], 4);
        assert_eq!(value["received"], 0);
    }
}

use std::collections::{
    HashMap,
    HashSet,
};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use argus_commons::models::alert_model::{
    Alert,
    AlertStatus,
};
use argus_commons::models::settings_model::AlertsVectorSettings;
use argus_metrics::Metrics;
use chrono::Utc;
use log::{
    debug,
    info,
    warn,
};

use crate::persistence::AlertsPersistence;

#[derive(Debug, Default)]
struct VectorInner {
    alerts: HashMap<String, Alert>,
    dirty: HashSet<String>,
    tombstoned: HashSet<String>,
    crash_recovery: bool,
}

/// In-memory authoritative store of current alerts, keyed by fingerprint.
/// One mutex guards the map and the dirty/tombstone sets, so the batch
/// writer always observes a consistent diff.
pub struct AlertsVector {
    inner: Mutex<VectorInner>,
    ttl: Duration,
    metrics: Arc<Metrics>,
}

impl AlertsVector {
    pub fn new(settings: &AlertsVectorSettings, metrics: Arc<Metrics>) -> Self {
        AlertsVector {
            inner: Mutex::new(VectorInner::default()),
            ttl: settings.alert_ttl,
            metrics,
        }
    }

    /// Inserts or replaces the entry for the alert's fingerprint. A CANCEL
    /// for a fingerprint the vector has never held is silently dropped.
    /// Returns whether the vector changed.
    pub fn update_alert(&self, mut alert: Alert) -> bool {
        if alert.fingerprint.is_empty() {
            warn!("rejecting alert {:?} without a fingerprint", alert.name);
            return false;
        }

        let mut inner = self.inner.lock().unwrap();
        let existing = inner.alerts.get(&alert.fingerprint);

        if existing.is_none() && alert.status == AlertStatus::Cancel {
            debug!(
                "dropping CANCEL for unknown fingerprint {}",
                alert.fingerprint
            );
            return false;
        }

        let mut last_seen = Utc::now();
        if let Some(previous) = existing {
            // lastSeen is strictly monotonic per fingerprint.
            if last_seen <= previous.last_seen {
                last_seen = previous.last_seen + chrono::Duration::microseconds(1);
            }
            if previous.status != alert.status {
                self.count_lifecycle(alert.status);
            }
        } else {
            self.count_lifecycle(alert.status);
        }
        alert.last_seen = last_seen;

        let fingerprint = alert.fingerprint.clone();
        inner.alerts.insert(fingerprint.clone(), alert);
        inner.dirty.insert(fingerprint.clone());
        inner.tombstoned.remove(&fingerprint);
        true
    }

    /// Removes the entry, moving its fingerprint to the tombstone set.
    /// Returns whether it existed.
    pub fn remove_alert(&self, fingerprint: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.alerts.remove(fingerprint).is_none() {
            return false;
        }
        inner.dirty.remove(fingerprint);
        inner.tombstoned.insert(fingerprint.to_string());
        self.metrics.inc_resolved();
        true
    }

    pub fn get_alert(&self, fingerprint: &str) -> Option<Alert> {
        self.inner.lock().unwrap().alerts.get(fingerprint).cloned()
    }

    /// Point-in-time copy ordered by `(priority asc, timestamp asc)`.
    pub fn get_snapshot(&self) -> Vec<Alert> {
        let inner = self.inner.lock().unwrap();
        let mut snapshot: Vec<Alert> = inner.alerts.values().cloned().collect();
        snapshot.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });
        snapshot
    }

    /// Evicts CREATE entries not refreshed within the TTL. Evicted entries
    /// are tombstoned so L2 forgets them too.
    pub fn cleanup_expired_alerts(&self) -> usize {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();

        let expired: Vec<String> = inner
            .alerts
            .values()
            .filter(|alert| {
                alert.status == AlertStatus::Create && now - alert.last_seen > ttl
            })
            .map(|alert| alert.fingerprint.clone())
            .collect();

        for fingerprint in &expired {
            inner.alerts.remove(fingerprint);
            inner.dirty.remove(fingerprint);
            inner.tombstoned.insert(fingerprint.clone());
        }

        if !expired.is_empty() {
            info!("evicted {} TTL-expired CREATE alert(s)", expired.len());
            self.metrics.inc_ttl_evicted_by(expired.len() as u64);
        }
        expired.len()
    }

    /// Pending L2 work: dirty entries with their current values, plus the
    /// tombstoned fingerprints.
    pub fn get_pending_changes(&self) -> (HashMap<String, Alert>, Vec<String>) {
        let inner = self.inner.lock().unwrap();
        let dirty = inner
            .dirty
            .iter()
            .filter_map(|fingerprint| {
                inner
                    .alerts
                    .get(fingerprint)
                    .map(|alert| (fingerprint.clone(), alert.clone()))
            })
            .collect();
        let tombstoned = inner.tombstoned.iter().cloned().collect();
        (dirty, tombstoned)
    }

    pub fn clear_dirty_flags(&self, fingerprints: &[String]) {
        let mut inner = self.inner.lock().unwrap();
        for fingerprint in fingerprints {
            inner.dirty.remove(fingerprint);
        }
    }

    pub fn clear_removed_flags(&self, fingerprints: &[String]) {
        let mut inner = self.inner.lock().unwrap();
        for fingerprint in fingerprints {
            inner.tombstoned.remove(fingerprint);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this instance booted from a non-empty L2 map.
    pub fn crash_recovery(&self) -> bool {
        self.inner.lock().unwrap().crash_recovery
    }

    /// Boot-time hydration. A non-empty L2 map flips the instance into
    /// crash-recovery mode; load errors are swallowed and leave a fresh
    /// start.
    pub async fn initialize_from_l2(&self, persistence: &AlertsPersistence) -> bool {
        let loaded = persistence.load_all().await;
        if loaded.is_empty() {
            info!("L2 store empty, booting fresh");
            return false;
        }

        let count = loaded.len();
        let mut inner = self.inner.lock().unwrap();
        inner.alerts = loaded;
        inner.crash_recovery = true;
        drop(inner);

        info!("booting in crash recovery with {count} alert(s) from L2");
        self.metrics.set_vector_size(count as i64);
        true
    }

    fn count_lifecycle(&self, status: AlertStatus) {
        match status {
            AlertStatus::Create => self.metrics.inc_created(),
            AlertStatus::Unknown => self.metrics.inc_unknown(),
            AlertStatus::Cancel | AlertStatus::Ignore => {}
        }
    }
}

use std::collections::HashMap;

use chrono::{
    DateTime,
    Utc,
};
use log::warn;
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};

use crate::models::alert_model::{
    Alert,
    AlertStatus,
};
use crate::utils::duration::parse_duration;

pub const SOURCE_PROMETHEUS_PUSH: &str = "prometheus_push";

pub const LABEL_ALERTNAME: &str = "alertname";
pub const LABEL_PLATFORM: &str = "platform";
pub const LABEL_PRIORITY: &str = "priority";

/// One alert as pushed by the upstream alert receiver.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushAlert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_to_noc: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_window: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        rename = "generatorURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub generator_url: Option<String>,
}

impl PushAlert {
    pub fn name(&self) -> &str {
        self.labels
            .get(LABEL_ALERTNAME)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn platform(&self) -> &str {
        self.labels
            .get(LABEL_PLATFORM)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Declared numeric priority; missing or unparsable means lowest.
    pub fn priority(&self) -> i64 {
        self.labels
            .get(LABEL_PRIORITY)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(i64::MAX)
    }

    /// Explicit `status == "firing"` wins; otherwise the alert is firing
    /// while `endsAt` is absent, zero, or in the future.
    pub fn is_firing(&self) -> bool {
        if let Some(status) = &self.status {
            return status.eq_ignore_ascii_case("firing");
        }
        match self.ends_at {
            None => true,
            Some(ends_at) => ends_at.timestamp() <= 0 || ends_at > Utc::now(),
        }
    }

    /// Deterministic identity: SHA-256 hex digest of the canonical label
    /// string (`key=value` pairs sorted by key, newline-joined).
    pub fn fingerprint(&self) -> String {
        let mut pairs: Vec<_> = self.labels.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = Sha256::new();
        for (key, value) in pairs {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }

    /// Normalises the push form into the vector's alert record.
    pub fn to_alert(&self, execution_id: &str) -> Alert {
        let status = if self.is_firing() {
            AlertStatus::Create
        } else {
            AlertStatus::Cancel
        };

        let suppress_window = self.suppress_window.as_deref().and_then(|raw| {
            match parse_duration(raw) {
                Ok(window) => Some(window),
                Err(e) => {
                    warn!(
                        "ignoring invalid suppressWindow {raw:?} on alert {:?}: {e}",
                        self.name()
                    );
                    None
                }
            }
        });

        let now = Utc::now();
        Alert {
            priority: self.priority(),
            name: self.name().to_string(),
            summary: self
                .annotations
                .get("summary")
                .cloned()
                .unwrap_or_default(),
            description: self
                .annotations
                .get("description")
                .cloned()
                .unwrap_or_default(),
            payload: self
                .annotations
                .get("payload")
                .cloned()
                .unwrap_or_default(),
            source: SOURCE_PROMETHEUS_PUSH.to_string(),
            fingerprint: self.fingerprint(),
            status,
            send_to_noc: self.send_to_noc.unwrap_or(true),
            suppress_window,
            timestamp: self.starts_at,
            last_seen: now,
            annotations: self.annotations.clone(),
            execution_id: execution_id.to_string(),
            prometheus: Some(self.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_alert(labels: &[(&str, &str)]) -> PushAlert {
        PushAlert {
            status: None,
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

    #[test]
    fn test_fingerprint_is_label_order_independent() {
        let a = push_alert(&[("alertname", "X"), ("platform", "argus")]);
        let b = push_alert(&[("platform", "argus"), ("alertname", "X")]);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_differs_per_labels() {
        let a = push_alert(&[("alertname", "X")]);
        let b = push_alert(&[("alertname", "Y")]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_is_firing_from_explicit_status() {
        let mut alert = push_alert(&[("alertname", "X")]);
        alert.status = Some("firing".to_string());
        assert!(alert.is_firing());
        alert.status = Some("RESOLVED".to_string());
        assert!(!alert.is_firing());
    }

    #[test]
    fn test_is_firing_from_ends_at() {
        let mut alert = push_alert(&[("alertname", "X")]);
        assert!(alert.is_firing(), "no endsAt means firing");

        alert.ends_at = Some(Utc::now() + chrono::Duration::hours(1));
        assert!(alert.is_firing(), "future endsAt means firing");

        alert.ends_at = Some(DateTime::from_timestamp(0, 0).unwrap());
        assert!(alert.is_firing(), "zero endsAt means firing");

        alert.ends_at = Some(Utc::now() - chrono::Duration::hours(1));
        assert!(!alert.is_firing(), "past endsAt means resolved");
    }

    #[test]
    fn test_priority_defaults_to_lowest() {
        assert_eq!(push_alert(&[("alertname", "X")]).priority(), i64::MAX);
        assert_eq!(
            push_alert(&[("alertname", "X"), ("priority", "5")]).priority(),
            5
        );
        assert_eq!(
            push_alert(&[("alertname", "X"), ("priority", "bogus")]).priority(),
            i64::MAX
        );
    }

    #[test]
    fn test_to_alert_maps_firing_to_create() {
        let mut alert = push_alert(&[("alertname", "ElasticDown"), ("priority", "5")]);
        alert.status = Some("firing".to_string());
        alert
            .annotations
            .insert("summary".to_string(), "es is down".to_string());

        let dto = alert.to_alert("exec-00000001");
        assert_eq!(dto.status, AlertStatus::Create);
        assert_eq!(dto.priority, 5);
        assert_eq!(dto.name, "ElasticDown");
        assert_eq!(dto.summary, "es is down");
        assert_eq!(dto.source, SOURCE_PROMETHEUS_PUSH);
        assert_eq!(dto.execution_id, "exec-00000001");
        assert!(dto.send_to_noc, "push alerts default to sendToNoc");
        assert!(dto.prometheus.is_some(), "original payload kept");
    }

    #[test]
    fn test_to_alert_maps_resolved_to_cancel() {
        let mut alert = push_alert(&[("alertname", "ElasticDown")]);
        alert.status = Some("resolved".to_string());
        let dto = alert.to_alert("exec-00000002");
        assert_eq!(dto.status, AlertStatus::Cancel);
    }

    #[test]
    fn test_to_alert_drops_invalid_suppress_window() {
        let mut alert = push_alert(&[("alertname", "X")]);
        alert.suppress_window = Some("10x".to_string());
        assert_eq!(alert.to_alert("exec-00000003").suppress_window, None);

        alert.suppress_window = Some("10m".to_string());
        assert_eq!(
            alert.to_alert("exec-00000004").suppress_window,
            Some(std::time::Duration::from_secs(600))
        );
    }
}

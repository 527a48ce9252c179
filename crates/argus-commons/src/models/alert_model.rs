use std::collections::HashMap;
use std::time::Duration;

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::models::push_model::PushAlert;
use crate::utils::duration;

/// Reserved priorities. Lower value means higher priority; push alerts use
/// their declared numeric priority and fall back to `i64::MAX` when absent.
pub const PRIORITY_PROMETHEUS_DOWN: i64 = -3;
pub const PRIORITY_KSM_DOWN: i64 = -2;
pub const PRIORITY_WATCHDOG: i64 = -1;

pub const FINGERPRINT_PROMETHEUS_LAYER: &str = "k8s-layer-prometheus";
pub const FINGERPRINT_KSM_LAYER: &str = "k8s-layer-ksm";
pub const FINGERPRINT_WATCHDOG: &str = "watchdog";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    Create,
    Cancel,
    Ignore,
    Unknown,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Create => "CREATE",
            AlertStatus::Cancel => "CANCEL",
            AlertStatus::Ignore => "IGNORE",
            AlertStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Normalised alert record. `fingerprint` is the sole identity: the vector
/// holds at most one entry per fingerprint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub priority: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub source: String,
    pub fingerprint: String,
    pub status: AlertStatus,
    #[serde(default)]
    pub send_to_noc: bool,
    #[serde(
        default,
        with = "duration::option_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub suppress_window: Option<Duration>,
    pub timestamp: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub execution_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus: Option<PushAlert>,
}

impl Alert {
    /// Minimal constructor used by internal sources; callers fill the NOC
    /// behaviour fields afterwards.
    pub fn new(
        fingerprint: impl Into<String>, name: impl Into<String>, status: AlertStatus,
        priority: i64,
    ) -> Self {
        let now = Utc::now();
        Alert {
            priority,
            name: name.into(),
            summary: String::new(),
            description: String::new(),
            payload: String::new(),
            source: String::new(),
            fingerprint: fingerprint.into(),
            status,
            send_to_noc: false,
            suppress_window: None,
            timestamp: now,
            last_seen: now,
            annotations: HashMap::new(),
            execution_id: String::new(),
            prometheus: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&AlertStatus::Create).unwrap(),
            "\"CREATE\""
        );
        assert_eq!(
            serde_json::from_str::<AlertStatus>("\"CANCEL\"").unwrap(),
            AlertStatus::Cancel
        );
    }

    #[test]
    fn test_alert_round_trips_through_json() {
        let mut alert = Alert::new("fp-1", "ElasticDown", AlertStatus::Create, 5);
        alert.suppress_window = Some(Duration::from_secs(600));
        alert.annotations
            .insert("summary".to_string(), "es down".to_string());

        let encoded = serde_json::to_string(&alert).expect("encode");
        assert!(encoded.contains("\"suppressWindow\":\"10m\""), "{encoded}");

        let decoded: Alert = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded.fingerprint, "fp-1");
        assert_eq!(decoded.status, AlertStatus::Create);
        assert_eq!(decoded.suppress_window, Some(Duration::from_secs(600)));
        assert_eq!(decoded.annotations["summary"], "es down");
    }
}

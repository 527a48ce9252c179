use argus_k8s::LayerState;
use argus_metrics::MetricsSnapshot;
use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;

use crate::watchdog::WatchdogStatus;

/// Aggregated health view served by `GET /api/health`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgusState {
    pub status: String,
    pub crash_recovery: bool,
    pub vector_size: usize,
    pub watchdog: WatchdogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k8s_layer: Option<LayerState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_alert_received_at: Option<DateTime<Utc>>,
    pub metrics: MetricsSnapshot,
}

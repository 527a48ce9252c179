use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;

/// Outcome of the six-step liveness check for one watched pod.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PodHealth {
    Healthy,
    Down(String),
    Unstable(String),
    Unknown(String),
}

impl PodHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, PodHealth::Healthy)
    }

    pub fn reason(&self) -> &str {
        match self {
            PodHealth::Healthy => "",
            PodHealth::Down(reason)
            | PodHealth::Unstable(reason)
            | PodHealth::Unknown(reason) => reason,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayerStatus {
    Critical,
    Unknown,
    Degraded,
    Partial,
    Healthy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayerPriority {
    Critical,
    High,
    Normal,
    None,
}

/// Combined view of one polling cycle over the Prometheus and KSM pods.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerState {
    pub prometheus: PodHealth,
    pub ksm: PodHealth,
    pub status: LayerStatus,
    pub priority: LayerPriority,
    pub checked_at: DateTime<Utc>,
}

impl LayerState {
    /// The Prometheus pod dominates: without it the whole layer is blind,
    /// so KSM findings only refine a healthy-Prometheus picture.
    pub fn derive(prometheus: PodHealth, ksm: PodHealth) -> Self {
        let (status, priority) = match (&prometheus, &ksm) {
            (PodHealth::Down(_) | PodHealth::Unstable(_), _) => {
                (LayerStatus::Critical, LayerPriority::Critical)
            }
            (PodHealth::Unknown(_), _) => (LayerStatus::Unknown, LayerPriority::Critical),
            (PodHealth::Healthy, PodHealth::Down(_)) => {
                (LayerStatus::Degraded, LayerPriority::High)
            }
            (PodHealth::Healthy, PodHealth::Unknown(_)) => {
                (LayerStatus::Partial, LayerPriority::High)
            }
            (PodHealth::Healthy, PodHealth::Unstable(_)) => {
                (LayerStatus::Degraded, LayerPriority::Normal)
            }
            (PodHealth::Healthy, PodHealth::Healthy) => {
                (LayerStatus::Healthy, LayerPriority::None)
            }
        };
        LayerState {
            prometheus,
            ksm,
            status,
            priority,
            checked_at: Utc::now(),
        }
    }
}

use std::time::Duration;

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::models::alert_model::Alert;
use crate::utils::duration;

fn default_true() -> bool {
    true
}

/// NOC behaviour attached to an alert by its producing source.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NocBehavior {
    #[serde(default)]
    pub send_to_noc: bool,
    #[serde(default)]
    pub payload: String,
    #[serde(
        default,
        with = "duration::option_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub suppress_window: Option<Duration>,
}

/// One unit of work for the NOC queue. Each decision carries the snapshot
/// timestamp and the correlation ID of the snapshot that produced it.
#[derive(Clone, Debug)]
pub enum NocDecision {
    HandleCreate {
        alert: Alert,
        taken_at: DateTime<Utc>,
        correlation_id: String,
    },
    HandleUnknown {
        alert: Alert,
        taken_at: DateTime<Utc>,
        correlation_id: String,
    },
    HandleCancels {
        alerts: Vec<Alert>,
        taken_at: DateTime<Utc>,
        correlation_id: String,
    },
}

impl NocDecision {
    pub fn kind(&self) -> &'static str {
        match self {
            NocDecision::HandleCreate { .. } => "create",
            NocDecision::HandleUnknown { .. } => "unknown",
            NocDecision::HandleCancels { .. } => "cancels",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            NocDecision::HandleCreate { correlation_id, .. }
            | NocDecision::HandleUnknown { correlation_id, .. }
            | NocDecision::HandleCancels { correlation_id, .. } => correlation_id,
        }
    }
}

/// Egress wire form POSTed to the NOC endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NocMessage {
    pub priority: i64,
    pub name: String,
    pub summary: String,
    pub description: String,
    pub payload: String,
    pub source: String,
    #[serde(
        default,
        with = "duration::option_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub suppress_window: Option<Duration>,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

impl NocMessage {
    pub fn from_alert(alert: &Alert, correlation_id: &str) -> Self {
        NocMessage {
            priority: alert.priority,
            name: alert.name.clone(),
            summary: alert.summary.clone(),
            description: alert.description.clone(),
            payload: alert.payload.clone(),
            source: alert.source.clone(),
            suppress_window: alert.suppress_window,
            correlation_id: correlation_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Alert content the pupil keeps on behalf of its customer worker; sent to
/// NOC when the worker goes silent or on explicit request.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NocDetails {
    #[serde(default)]
    pub priority: i64,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_true")]
    pub send_to_noc: bool,
    #[serde(
        default,
        with = "duration::option_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub suppress_window: Option<Duration>,
}

impl NocDetails {
    pub fn to_message(&self, correlation_id: &str) -> NocMessage {
        NocMessage {
            priority: self.priority,
            name: self.name.clone(),
            summary: self.summary.clone(),
            description: self.description.clone(),
            payload: self.payload.clone(),
            source: self.source.clone(),
            suppress_window: self.suppress_window,
            correlation_id: correlation_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

use argus_commons::models::noc_model::NocDetails;
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

pub const RECOVERY_RECORD_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Heartbeat,
    SendNocMessage,
}

/// Request accepted by the pupil listener.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PupilRequest {
    pub message_type: MessageType,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub noc_details: NocDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PupilResponse {
    pub accepted: bool,
    pub correlation_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl PupilResponse {
    pub fn accepted(correlation_id: &str, message: impl Into<String>) -> Self {
        PupilResponse {
            accepted: true,
            correlation_id: correlation_id.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn rejected(correlation_id: &str, message: impl Into<String>) -> Self {
        PupilResponse {
            accepted: false,
            correlation_id: correlation_id.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Disk record written when NOC retries are exhausted; replayed on the next
/// boot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryRecord {
    pub version: u32,
    pub failed_at: DateTime<Utc>,
    pub correlation_id: String,
    pub source: String,
    pub failure_reason: String,
    pub noc_details: NocDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered_at: Option<DateTime<Utc>>,
}

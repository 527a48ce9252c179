use std::sync::Arc;

use argus_commons::models::noc_model::NocDetails;
use argus_commons::models::settings_model::NocClientSettings;
use argus_noc::{
    NocError,
    NocTransport,
};
use chrono::Utc;
use log::{
    debug,
    error,
    info,
    warn,
};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::sleep;

use crate::models::{
    RecoveryRecord,
    RECOVERY_RECORD_VERSION,
};
use crate::recovery::RecoveryStore;

pub const PUPIL_SOURCE: &str = "argus-pupil";

#[derive(Debug, Error)]
pub enum PupilError {
    #[error("NOC delivery failed after {attempts} attempts: {reason}")]
    NocExhausted { attempts: u32, reason: String },
}

/// NOC delivery with geometric retry backoff. A definitive failure persists
/// a recovery record and asks the host process to shut down, so the next
/// boot replays the message.
pub struct PupilNocClient {
    transport: Arc<dyn NocTransport>,
    settings: NocClientSettings,
    recovery: Arc<RecoveryStore>,
    stop: Arc<Notify>,
}

impl PupilNocClient {
    pub fn new(
        transport: Arc<dyn NocTransport>, settings: NocClientSettings,
        recovery: Arc<RecoveryStore>, stop: Arc<Notify>,
    ) -> Self {
        PupilNocClient {
            transport,
            settings,
            recovery,
            stop,
        }
    }

    pub async fn send(&self, details: &NocDetails, correlation_id: &str) -> Result<(), PupilError> {
        if !details.send_to_noc {
            debug!("[{correlation_id}] sendToNoc disabled for {:?}, skipping", details.name);
            return Ok(());
        }

        let message = details.to_message(correlation_id);
        let total_attempts = 1 + self.settings.max_retries;
        let mut last_reason = String::new();

        for attempt in 1..=total_attempts {
            match self.transport.post(&message).await {
                Ok(()) => {
                    info!("[{correlation_id}] NOC accepted {:?}", details.name);
                    return Ok(());
                }
                Err(e) => {
                    last_reason = failure_reason(&e);
                    warn!(
                        "[{correlation_id}] NOC POST attempt {attempt}/{total_attempts} failed: {last_reason}"
                    );
                }
            }
            if attempt < total_attempts {
                sleep(self.settings.retry_delay(attempt)).await;
            }
        }

        let record = RecoveryRecord {
            version: RECOVERY_RECORD_VERSION,
            failed_at: Utc::now(),
            correlation_id: correlation_id.to_string(),
            source: PUPIL_SOURCE.to_string(),
            failure_reason: last_reason.clone(),
            noc_details: details.clone(),
            recovered_at: None,
        };
        if let Err(e) = self.recovery.persist(&record).await {
            error!("[{correlation_id}] failed to persist recovery record: {e}");
        }

        error!("[{correlation_id}] NOC retries exhausted, requesting shutdown");
        self.stop.notify_waiters();

        Err(PupilError::NocExhausted {
            attempts: total_attempts,
            reason: last_reason,
        })
    }

    /// Startup replay: one delivery attempt for a persisted record. Success
    /// deletes the file; failure leaves it for the next boot.
    pub async fn replay_recovery(&self) {
        let Some(record) = self.recovery.load().await else {
            return;
        };

        info!(
            "replaying recovery record from {} (failed at {})",
            self.recovery.path().display(),
            record.failed_at
        );

        let mut details = record.noc_details.clone();
        details.summary = format!("[RECOVERY] {}", details.summary);
        details.description = format!(
            "{}\noriginal delivery failed at {}: {}",
            details.description, record.failed_at, record.failure_reason
        );

        let message = details.to_message(&record.correlation_id);
        match self.transport.post(&message).await {
            Ok(()) => {
                info!("recovery record delivered to NOC");
                if let Err(e) = self.recovery.delete().await {
                    warn!("delivered recovery record but could not delete it: {e}");
                }
            }
            Err(e) => {
                warn!(
                    "recovery replay failed ({}); keeping the record for the next boot",
                    failure_reason(&e)
                );
            }
        }
    }
}

fn failure_reason(error: &NocError) -> String {
    match error {
        NocError::Status(code) => format!("HTTP {code}"),
        NocError::Transport(reason) => reason.clone(),
    }
}

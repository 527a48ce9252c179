use std::path::{
    Path,
    PathBuf,
};

use anyhow::Context;
use argus_commons::models::settings_model::PersistenceSettings;
use log::{
    info,
    warn,
};
use tokio::fs;

use crate::models::RecoveryRecord;

/// Disk-backed recovery record, written via temp file + atomic rename.
pub struct RecoveryStore {
    path: PathBuf,
}

impl RecoveryStore {
    pub fn new(settings: &PersistenceSettings) -> Self {
        RecoveryStore {
            path: Path::new(&settings.storage_path).join(&settings.recovery_file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn persist(&self, record: &RecoveryRecord) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let encoded = serde_json::to_vec_pretty(record).context("failed to encode record")?;
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &encoded)
            .await
            .with_context(|| format!("failed to write {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .await
            .with_context(|| format!("failed to move record into {}", self.path.display()))?;

        info!("recovery record written to {}", self.path.display());
        Ok(())
    }

    /// Reads the record if one exists. A corrupt file is deleted so a bad
    /// write cannot wedge every subsequent boot.
    pub async fn load(&self) -> Option<RecoveryRecord> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("failed to read {}: {e}", self.path.display());
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    "deleting corrupt recovery record {}: {e}",
                    self.path.display()
                );
                let _ = fs::remove_file(&self.path).await;
                None
            }
        }
    }

    pub async fn delete(&self) -> anyhow::Result<()> {
        fs::remove_file(&self.path)
            .await
            .with_context(|| format!("failed to delete {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::models::RECOVERY_RECORD_VERSION;

    use super::*;

    fn store_in(dir: &Path) -> RecoveryStore {
        RecoveryStore::new(&PersistenceSettings {
            storage_path: dir.to_string_lossy().to_string(),
            recovery_file_name: "noc-recovery.json".to_string(),
        })
    }

    fn record() -> RecoveryRecord {
        RecoveryRecord {
            version: RECOVERY_RECORD_VERSION,
            failed_at: Utc::now(),
            correlation_id: "noc-00000001".to_string(),
            source: "argus-pupil".to_string(),
            failure_reason: "HTTP 500".to_string(),
            noc_details: serde_json::from_str(r#"{"name": "WorkerSilent"}"#).unwrap(),
            recovered_at: None,
        }
    }

    #[tokio::test]
    async fn test_persist_load_delete_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());

        assert!(store.load().await.is_none(), "nothing persisted yet");

        store.persist(&record()).await.expect("persist");
        let loaded = store.load().await.expect("load");
        assert_eq!(loaded.failure_reason, "HTTP 500");

        store.delete().await.expect("delete");
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_persist_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        store.persist(&record()).await.expect("persist");

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["noc-recovery.json".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_deleted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        tokio::fs::write(store.path(), "{ not json").await.unwrap();

        assert!(store.load().await.is_none());
        assert!(
            !store.path().exists(),
            "corrupt record must not wedge the next boot"
        );
    }
}

use std::sync::Arc;
use std::time::Duration;

use log::{
    debug,
    info,
};
use tokio::sync::Notify;
use tokio::time::interval;

use crate::persistence::AlertsPersistence;
use crate::vector::AlertsVector;

/// Background L1 -> L2 flush loop. Every window it snapshots the pending
/// dirty/tombstoned sets and clears flags only for keys that reached L2.
pub struct BatchWriter {
    vector: Arc<AlertsVector>,
    persistence: Arc<AlertsPersistence>,
    window: Duration,
    shutdown: Arc<Notify>,
}

impl BatchWriter {
    pub fn new(
        vector: Arc<AlertsVector>, persistence: Arc<AlertsPersistence>, window: Duration,
        shutdown: Arc<Notify>,
    ) -> Self {
        BatchWriter {
            vector,
            persistence,
            window,
            shutdown,
        }
    }

    pub async fn run(&self) {
        info!("batch writer started (window {:?})", self.window);
        let mut ticker = interval(self.window);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of tokio's interval fires immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush().await;
                }
                _ = self.shutdown.notified() => {
                    info!("batch writer stopping, flushing pending changes");
                    self.flush().await;
                    break;
                }
            }
        }
    }

    pub async fn flush(&self) {
        let (dirty, tombstoned) = self.vector.get_pending_changes();
        if dirty.is_empty() && tombstoned.is_empty() {
            return;
        }
        debug!(
            "flushing {} dirty and {} tombstoned fingerprint(s) to L2",
            dirty.len(),
            tombstoned.len()
        );

        if !dirty.is_empty() {
            let outcome = self.persistence.save_batch(&dirty).await;
            self.vector.clear_dirty_flags(&outcome.persisted);
        }
        if !tombstoned.is_empty() {
            let outcome = self.persistence.remove_batch(&tombstoned).await;
            self.vector.clear_removed_flags(&outcome.persisted);
        }
    }
}

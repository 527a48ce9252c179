use std::sync::atomic::{
    AtomicI64,
    Ordering,
};
use std::sync::Arc;
use std::time::{
    Duration,
    Instant,
};

use argus_commons::models::noc_model::NocDecision;
use argus_metrics::Metrics;
use dashmap::DashMap;
use log::debug;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// FIFO of NOC decisions plus the duplicate-window marks that keep the
/// snapshot service from re-enqueuing a fingerprint it just handed over.
pub struct NocQueue {
    tx: mpsc::UnboundedSender<NocDecision>,
    rx: Mutex<mpsc::UnboundedReceiver<NocDecision>>,
    depth: AtomicI64,
    marks: DashMap<String, Instant>,
    duplicate_window: Duration,
    metrics: Arc<Metrics>,
}

impl NocQueue {
    pub fn new(duplicate_window: Duration, metrics: Arc<Metrics>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        NocQueue {
            tx,
            rx: Mutex::new(rx),
            depth: AtomicI64::new(0),
            marks: DashMap::new(),
            duplicate_window,
            metrics,
        }
    }

    pub fn enqueue(&self, decision: NocDecision) {
        self.metrics.inc_noc_decision(decision.kind());
        if self.tx.send(decision).is_ok() {
            let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
            self.metrics.set_noc_queue_depth(depth);
        }
    }

    pub fn queue_depth(&self) -> i64 {
        self.depth.load(Ordering::SeqCst)
    }

    /// True while a mark for the fingerprint is younger than the duplicate
    /// window, regardless of the alert's current status.
    pub fn was_recently_enqueued(&self, fingerprint: &str) -> bool {
        match self.marks.get(fingerprint) {
            None => false,
            Some(mark) => mark.elapsed() < self.duplicate_window,
        }
    }

    pub fn mark_as_enqueued(&self, fingerprint: &str) {
        self.marks.insert(fingerprint.to_string(), Instant::now());
    }

    pub fn evict_stale_marks(&self) {
        let before = self.marks.len();
        self.marks
            .retain(|_, mark| mark.elapsed() < self.duplicate_window);
        let evicted = before - self.marks.len();
        if evicted > 0 {
            debug!("evicted {evicted} stale duplicate-window mark(s)");
        }
    }

    /// Awaits the next decision. Returns `None` once every sender is gone.
    pub async fn dequeue(&self) -> Option<NocDecision> {
        let decision = self.rx.lock().await.recv().await;
        if decision.is_some() {
            let depth = self.depth.fetch_sub(1, Ordering::SeqCst) - 1;
            self.metrics.set_noc_queue_depth(depth);
        }
        decision
    }
}

use std::time::{
    Duration,
    Instant,
};

use argus_commons::models::alert_model::Alert;
use argus_commons::utils::duration::parse_duration;
use dashmap::DashMap;
use log::{
    debug,
    warn,
};

pub const ANNOTATION_SUPPRESS_WINDOW: &str = "suppress_window";

#[derive(Clone, Copy, Debug)]
struct SuppressionEntry {
    last_sent: Instant,
    window: Duration,
}

/// Per-fingerprint bookkeeping of the last NOC dispatch, used to hold back
/// repeats inside the suppression window.
pub struct SuppressionCache {
    entries: DashMap<String, SuppressionEntry>,
    default_window: Duration,
}

impl SuppressionCache {
    pub fn new(default_window: Duration) -> Self {
        SuppressionCache {
            entries: DashMap::new(),
            default_window,
        }
    }

    /// Window precedence: explicit alert field (whole seconds), then the
    /// `suppress_window` annotation (empty string means no suppression,
    /// invalid strings fall through with a warning), then the configured
    /// default.
    pub fn get_suppression_window(&self, alert: &Alert) -> Duration {
        if let Some(window) = alert.suppress_window {
            return Duration::from_secs(window.as_secs());
        }

        if let Some(annotation) = alert.annotations.get(ANNOTATION_SUPPRESS_WINDOW) {
            if annotation.is_empty() {
                return Duration::ZERO;
            }
            match parse_duration(annotation) {
                Ok(window) => return window,
                Err(e) => {
                    warn!(
                        "invalid suppress_window annotation {annotation:?} on {}: {e}; using default",
                        alert.fingerprint
                    );
                }
            }
        }

        self.default_window
    }

    pub fn should_suppress(&self, alert: &Alert) -> bool {
        if self.get_suppression_window(alert).is_zero() {
            return false;
        }
        match self.entries.get(&alert.fingerprint) {
            None => false,
            Some(entry) => entry.last_sent.elapsed() < entry.window,
        }
    }

    /// Records a dispatch; windowless alerts are never recorded.
    pub fn mark_as_sent(&self, alert: &Alert) {
        let window = self.get_suppression_window(alert);
        if window.is_zero() {
            return;
        }
        self.entries.insert(
            alert.fingerprint.clone(),
            SuppressionEntry {
                last_sent: Instant::now(),
                window,
            },
        );
    }

    pub fn cleanup(&self) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.last_sent.elapsed() <= entry.window);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!("suppression cache evicted {evicted} expired entr(ies)");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

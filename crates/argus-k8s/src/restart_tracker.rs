use std::collections::VecDeque;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::time::Instant;

use argus_commons::models::settings_model::RestartTrackingSettings;
use dashmap::DashMap;
use log::{
    debug,
    info,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestartObservation {
    pub stable: bool,
    pub restarts_in_window: u32,
}

/// Sliding window of restart counts per pod. A pod is unstable when the
/// restarts accumulated across a full window reach the configured
/// threshold, outside the boot grace period.
pub struct RestartTracker {
    settings: RestartTrackingSettings,
    windows: DashMap<String, VecDeque<u32>>,
    started_at: Instant,
    grace_enabled: bool,
    grace_expiry_logged: AtomicBool,
}

impl RestartTracker {
    /// `crash_recovery` disables the grace period entirely: a crashed
    /// coordinator must notice restart storms immediately after boot.
    pub fn new(settings: RestartTrackingSettings, crash_recovery: bool) -> Self {
        RestartTracker {
            settings,
            windows: DashMap::new(),
            started_at: Instant::now(),
            grace_enabled: !crash_recovery,
            grace_expiry_logged: AtomicBool::new(false),
        }
    }

    pub fn observe(&self, pod_id: &str, restart_count: u32) -> RestartObservation {
        let mut window = self
            .windows
            .entry(pod_id.to_string())
            .or_insert_with(VecDeque::new);
        window.push_back(restart_count);
        while window.len() > self.settings.window_size {
            window.pop_front();
        }

        let restarts_in_window = if window.len() >= 2 {
            let oldest = *window.front().unwrap_or(&restart_count);
            restart_count.saturating_sub(oldest)
        } else {
            0
        };

        let stable = if self.grace_active() {
            true
        } else if window.len() < self.settings.window_size {
            // Still bootstrapping the window.
            true
        } else {
            restarts_in_window < self.settings.restart_threshold
        };

        debug!(
            "pod {pod_id}: {restarts_in_window} restart(s) in window of {} sample(s), stable={stable}",
            window.len()
        );

        RestartObservation {
            stable,
            restarts_in_window,
        }
    }

    fn grace_active(&self) -> bool {
        if !self.grace_enabled {
            return false;
        }
        if self.started_at.elapsed() < self.settings.normal_grace_period() {
            return true;
        }
        if !self.grace_expiry_logged.swap(true, Ordering::SeqCst) {
            info!(
                "restart tracking grace period of {}s is over",
                self.settings.normal_grace_period_seconds
            );
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(window_size: usize, restart_threshold: u32, grace_seconds: u64) -> RestartTrackingSettings {
        RestartTrackingSettings {
            window_size,
            restart_threshold,
            normal_grace_period_seconds: grace_seconds,
        }
    }

    #[test]
    fn test_stable_while_window_not_full() {
        let tracker = RestartTracker::new(settings(3, 1, 0), false);
        assert!(tracker.observe("pod-a", 5).stable);
        assert!(tracker.observe("pod-a", 6).stable);
        // Third sample fills the window; 2 restarts >= threshold 1.
        assert!(!tracker.observe("pod-a", 7).stable);
    }

    #[test]
    fn test_unstable_exactly_at_threshold() {
        let tracker = RestartTracker::new(settings(3, 2, 0), false);
        tracker.observe("pod-a", 10);
        tracker.observe("pod-a", 11);
        let observation = tracker.observe("pod-a", 12);
        assert_eq!(observation.restarts_in_window, 2);
        assert!(!observation.stable);
    }

    #[test]
    fn test_stable_below_threshold_with_full_window() {
        let tracker = RestartTracker::new(settings(3, 5, 0), false);
        tracker.observe("pod-a", 10);
        tracker.observe("pod-a", 11);
        let observation = tracker.observe("pod-a", 12);
        assert_eq!(observation.restarts_in_window, 2);
        assert!(observation.stable);
    }

    #[test]
    fn test_window_slides() {
        let tracker = RestartTracker::new(settings(2, 100, 0), false);
        tracker.observe("pod-a", 0);
        tracker.observe("pod-a", 10);
        // Window now [0, 10]; next push evicts 0.
        let observation = tracker.observe("pod-a", 11);
        assert_eq!(observation.restarts_in_window, 1);
    }

    #[test]
    fn test_grace_period_reports_stable() {
        let tracker = RestartTracker::new(settings(2, 1, 3600), false);
        tracker.observe("pod-a", 0);
        let observation = tracker.observe("pod-a", 50);
        assert_eq!(observation.restarts_in_window, 50);
        assert!(observation.stable, "grace period must mask instability");
    }

    #[test]
    fn test_crash_recovery_disables_grace() {
        let tracker = RestartTracker::new(settings(2, 1, 3600), true);
        tracker.observe("pod-a", 0);
        assert!(!tracker.observe("pod-a", 50).stable);
    }

    #[test]
    fn test_windows_are_per_pod() {
        let tracker = RestartTracker::new(settings(2, 1, 0), false);
        tracker.observe("pod-a", 0);
        tracker.observe("pod-b", 100);
        assert!(!tracker.observe("pod-a", 5).stable);
        assert!(tracker.observe("pod-b", 100).stable);
    }
}

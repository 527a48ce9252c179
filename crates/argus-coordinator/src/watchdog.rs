use std::sync::{
    Arc,
    Mutex,
};
use std::time::{
    Duration,
    Instant,
};

use argus_commons::models::alert_model::{
    Alert,
    AlertStatus,
    FINGERPRINT_WATCHDOG,
    PRIORITY_WATCHDOG,
};
use argus_commons::models::settings_model::WatchdogSettings;
use argus_commons::utils::correlation::execution_id;
use argus_vector::AlertsVector;
use chrono::{
    DateTime,
    Utc,
};
use log::{
    info,
    warn,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::sleep;

pub const SOURCE_WATCHDOG: &str = "watchdog";

#[derive(Debug, Default)]
struct WatchdogState {
    last_heartbeat: Option<DateTime<Utc>>,
    expired: bool,
    timer: Option<JoinHandle<()>>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogStatus {
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub expired: bool,
    pub grace_period_active: bool,
    pub timeout_seconds: u64,
}

/// Heartbeat-driven one-shot timer. Every heartbeat re-arms the expiration
/// timer (outside the grace period) and drops an IGNORE marker into the
/// vector; silence past the timeout emits the configured CREATE alert.
pub struct WatchdogService {
    settings: WatchdogSettings,
    vector: Arc<AlertsVector>,
    started_at: Instant,
    grace_period: Duration,
    state: Mutex<WatchdogState>,
}

impl WatchdogService {
    /// The grace period depends on how the vector booted: crash recovery
    /// uses the short window so a restart loop cannot hide a silent worker.
    pub fn new(settings: WatchdogSettings, vector: Arc<AlertsVector>, crash_recovery: bool) -> Self {
        let grace_period = if crash_recovery {
            settings.crash_recovery_grace_period()
        } else {
            settings.normal_grace_period()
        };
        WatchdogService {
            settings,
            vector,
            started_at: Instant::now(),
            grace_period,
            state: Mutex::new(WatchdogState::default()),
        }
    }

    /// Arms the first expiration timer once the grace period lapses, unless
    /// a heartbeat armed one in the meantime.
    pub fn start(self: &Arc<Self>) {
        let watchdog = Arc::clone(self);
        tokio::spawn(async move {
            sleep(watchdog.grace_period).await;
            let mut state = watchdog.state.lock().unwrap();
            if state.timer.is_none() && !state.expired {
                state.timer = Some(watchdog.spawn_timer());
                info!(
                    "watchdog armed for {}s after grace period",
                    watchdog.settings.timeout_seconds
                );
            }
        });
    }

    pub fn record_heartbeat(self: &Arc<Self>, correlation_id: &str) {
        {
            let mut state = self.state.lock().unwrap();
            state.last_heartbeat = Some(Utc::now());
            state.expired = false;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            if !self.grace_period_active() {
                state.timer = Some(self.spawn_timer());
            }
        }

        let mut alert = Alert::new(
            FINGERPRINT_WATCHDOG,
            &self.settings.alert_name,
            AlertStatus::Ignore,
            PRIORITY_WATCHDOG,
        );
        alert.summary = "watchdog heartbeat received".to_string();
        alert.source = SOURCE_WATCHDOG.to_string();
        alert.execution_id = execution_id();
        self.vector.update_alert(alert);
        info!("[{correlation_id}] watchdog heartbeat recorded");
    }

    pub fn grace_period_active(&self) -> bool {
        self.started_at.elapsed() < self.grace_period
    }

    pub fn status(&self) -> WatchdogStatus {
        let state = self.state.lock().unwrap();
        WatchdogStatus {
            last_heartbeat: state.last_heartbeat,
            expired: state.expired,
            grace_period_active: self.grace_period_active(),
            timeout_seconds: self.settings.timeout_seconds,
        }
    }

    fn spawn_timer(self: &Arc<Self>) -> JoinHandle<()> {
        let watchdog = Arc::clone(self);
        let timeout = self.settings.timeout();
        tokio::spawn(async move {
            sleep(timeout).await;
            watchdog.expire();
        })
    }

    fn expire(self: &Arc<Self>) {
        {
            let mut state = self.state.lock().unwrap();
            state.expired = true;
            state.timer = None;
        }
        warn!(
            "watchdog expired: no heartbeat within {}s",
            self.settings.timeout_seconds
        );

        let mut alert = Alert::new(
            FINGERPRINT_WATCHDOG,
            &self.settings.alert_name,
            AlertStatus::Create,
            PRIORITY_WATCHDOG,
        );
        alert.summary = format!(
            "no heartbeat received within {}s",
            self.settings.timeout_seconds
        );
        alert.payload = self.settings.payload.clone();
        alert.send_to_noc = self.settings.send_to_noc;
        alert.suppress_window = self.settings.suppress_window;
        alert.source = SOURCE_WATCHDOG.to_string();
        alert.execution_id = execution_id();
        self.vector.update_alert(alert);
    }
}

#[cfg(test)]
mod tests {
    use argus_commons::models::settings_model::AlertsVectorSettings;
    use argus_metrics::Metrics;

    use super::*;

    fn vector() -> Arc<AlertsVector> {
        Arc::new(AlertsVector::new(
            &AlertsVectorSettings {
                alert_ttl: Duration::from_secs(3600),
            },
            Arc::new(Metrics::new()),
        ))
    }

    fn settings(timeout: u64, grace: u64) -> WatchdogSettings {
        WatchdogSettings {
            alert_name: "ArgusWatchdog".to_string(),
            timeout_seconds: timeout,
            normal_grace_period_seconds: grace,
            crash_recovery_grace_period_seconds: 0,
            send_to_noc: true,
            payload: "watchdog-payload".to_string(),
            suppress_window: None,
        }
    }

    #[tokio::test]
    async fn test_heartbeat_writes_ignore_alert() {
        let vector = vector();
        let watchdog = Arc::new(WatchdogService::new(settings(300, 0), vector.clone(), false));

        watchdog.record_heartbeat("push-00000001");

        let alert = vector.get_alert(FINGERPRINT_WATCHDOG).expect("alert");
        assert_eq!(alert.status, AlertStatus::Ignore);
        assert_eq!(alert.priority, PRIORITY_WATCHDOG);
        assert!(!watchdog.status().expired);
        assert!(watchdog.status().last_heartbeat.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_without_any_heartbeat() {
        let vector = vector();
        let watchdog = Arc::new(WatchdogService::new(settings(5, 0), vector.clone(), false));
        watchdog.start();

        tokio::time::sleep(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;

        let alert = vector.get_alert(FINGERPRINT_WATCHDOG).expect("alert");
        assert_eq!(alert.status, AlertStatus::Create);
        assert!(alert.send_to_noc);
        assert_eq!(alert.payload, "watchdog-payload");
        assert!(watchdog.status().expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_rearms_timer() {
        let vector = vector();
        let watchdog = Arc::new(WatchdogService::new(settings(5, 0), vector.clone(), false));
        watchdog.start();

        tokio::time::sleep(Duration::from_secs(3)).await;
        watchdog.record_heartbeat("push-00000001");

        // Past the original deadline, but within the re-armed one.
        tokio::time::sleep(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        assert_eq!(
            vector.get_alert(FINGERPRINT_WATCHDOG).unwrap().status,
            AlertStatus::Ignore
        );

        tokio::time::sleep(Duration::from_secs(3)).await;
        tokio::task::yield_now().await;
        assert_eq!(
            vector.get_alert(FINGERPRINT_WATCHDOG).unwrap().status,
            AlertStatus::Create,
            "silence after the last heartbeat expires the watchdog"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_timer_during_grace_period() {
        let vector = vector();
        let watchdog = Arc::new(WatchdogService::new(settings(1, 60), vector.clone(), false));
        watchdog.start();
        watchdog.record_heartbeat("push-00000001");

        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(
            vector.get_alert(FINGERPRINT_WATCHDOG).unwrap().status,
            AlertStatus::Ignore,
            "no expiration while the grace period is active"
        );
    }

    #[test]
    fn test_crash_recovery_selects_short_grace() {
        let vector = vector();
        let mut settings = settings(300, 600);
        settings.crash_recovery_grace_period_seconds = 5;
        let watchdog = WatchdogService::new(settings, vector, true);
        assert_eq!(watchdog.grace_period, Duration::from_secs(5));
    }
}

use std::sync::{
    Arc,
    Mutex,
};
use std::time::{
    Duration,
    Instant,
};

use argus_commons::models::noc_model::NocDetails;
use argus_commons::models::settings_model::WatchdogSettings;
use argus_commons::utils::correlation::correlation_id;
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

use crate::noc_client::PupilNocClient;

#[derive(Debug, Default)]
struct PupilWatchdogState {
    last_heartbeat: Option<DateTime<Utc>>,
    expired: bool,
    timer: Option<JoinHandle<()>>,
    timeout: Option<Duration>,
    noc_details: Option<NocDetails>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PupilWatchdogStatus {
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub expired: bool,
    pub grace_period_active: bool,
    pub timeout_seconds: u64,
}

/// The pupil's own watchdog: armed by heartbeats from the customer worker,
/// it escalates silence straight to NOC through the pupil client.
pub struct PupilWatchdog {
    settings: WatchdogSettings,
    noc_client: Arc<PupilNocClient>,
    started_at: Instant,
    state: Mutex<PupilWatchdogState>,
}

impl PupilWatchdog {
    pub fn new(settings: WatchdogSettings, noc_client: Arc<PupilNocClient>) -> Self {
        PupilWatchdog {
            settings,
            noc_client,
            started_at: Instant::now(),
            state: Mutex::new(PupilWatchdogState::default()),
        }
    }

    /// Arms the first timer once the grace period lapses, unless a
    /// heartbeat already armed one.
    pub fn start(self: &Arc<Self>) {
        let watchdog = Arc::clone(self);
        tokio::spawn(async move {
            sleep(watchdog.settings.normal_grace_period()).await;
            let mut state = watchdog.state.lock().unwrap();
            if state.timer.is_none() && !state.expired {
                let timeout = state.timeout.unwrap_or_else(|| watchdog.settings.timeout());
                state.timer = Some(watchdog.spawn_timer(timeout));
                info!("pupil watchdog armed for {timeout:?} after grace period");
            }
        });
    }

    /// Heartbeat: re-arms the timer and stores the alert the worker wants
    /// sent if it goes silent.
    pub fn reset(
        self: &Arc<Self>, timeout_override: Option<u64>, details: NocDetails,
        correlation_id: &str,
    ) {
        let mut state = self.state.lock().unwrap();
        state.last_heartbeat = Some(Utc::now());
        state.expired = false;
        state.noc_details = Some(details);
        if let Some(seconds) = timeout_override {
            state.timeout = Some(Duration::from_secs(seconds));
        }
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let timeout = state.timeout.unwrap_or_else(|| self.settings.timeout());
        if !self.grace_period_active() {
            state.timer = Some(self.spawn_timer(timeout));
        }
        drop(state);
        info!("[{correlation_id}] pupil watchdog reset ({timeout:?})");
    }

    pub fn grace_period_active(&self) -> bool {
        self.started_at.elapsed() < self.settings.normal_grace_period()
    }

    pub fn status(&self) -> PupilWatchdogStatus {
        let state = self.state.lock().unwrap();
        PupilWatchdogStatus {
            last_heartbeat: state.last_heartbeat,
            expired: state.expired,
            grace_period_active: self.grace_period_active(),
            timeout_seconds: state
                .timeout
                .unwrap_or_else(|| self.settings.timeout())
                .as_secs(),
        }
    }

    fn spawn_timer(self: &Arc<Self>, timeout: Duration) -> JoinHandle<()> {
        let watchdog = Arc::clone(self);
        tokio::spawn(async move {
            sleep(timeout).await;
            watchdog.expire().await;
        })
    }

    async fn expire(self: &Arc<Self>) {
        let details = {
            let mut state = self.state.lock().unwrap();
            state.expired = true;
            state.timer = None;
            state.noc_details.clone()
        };
        warn!("pupil watchdog expired: customer worker went silent");

        let details = details.unwrap_or_else(|| self.default_details());
        let correlation = correlation_id("watchdog");
        // The client's failure path persists the record and requests
        // shutdown, so the error needs no extra handling here.
        let _ = self.noc_client.send(&details, &correlation).await;
    }

    fn default_details(&self) -> NocDetails {
        NocDetails {
            priority: -1,
            name: self.settings.alert_name.clone(),
            summary: format!(
                "no heartbeat received within {}s",
                self.settings.timeout_seconds
            ),
            description: String::new(),
            payload: self.settings.payload.clone(),
            source: crate::noc_client::PUPIL_SOURCE.to_string(),
            send_to_noc: self.settings.send_to_noc,
            suppress_window: self.settings.suppress_window,
        }
    }
}

mod events;
mod handler;
mod listener;
mod models;
mod noc_client;
mod recovery;
mod watchdog;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use argus_commons::models::settings_model::PupilSettings;
use argus_commons::utils::logging::init_logging;
use argus_commons::utils::settings::load_settings;
use argus_noc::HttpNocTransport;
use log::{
    error,
    info,
};
use tokio::signal;
use tokio::sync::Notify;

use crate::events::{
    EventDispatcher,
    LoggingEventHandler,
};
use crate::handler::PupilHandler;
use crate::listener::PupilListener;
use crate::noc_client::{
    PupilNocClient,
    PUPIL_SOURCE,
};
use crate::recovery::RecoveryStore;
use crate::watchdog::PupilWatchdog;

const SETTINGS_ENV: &str = "PUPIL_CONFIG";
const SETTINGS_DEFAULT_PATH: &str = "/etc/argus/pupil.json";

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let settings: PupilSettings = load_settings(SETTINGS_ENV, SETTINGS_DEFAULT_PATH)?;
    settings.validate().context("invalid settings")?;

    let stop = Arc::new(Notify::new());
    let recovery = Arc::new(RecoveryStore::new(&settings.persistence));
    let transport = Arc::new(HttpNocTransport::new(&settings.noc_client, PUPIL_SOURCE)?);
    let noc_client = Arc::new(PupilNocClient::new(
        transport,
        settings.noc_client.clone(),
        recovery,
        stop.clone(),
    ));

    // Replay any recovery record from a previous crash-looped delivery.
    noc_client.replay_recovery().await;

    let watchdog = Arc::new(PupilWatchdog::new(
        settings.watchdog.clone(),
        noc_client.clone(),
    ));
    watchdog.start();

    let events = Arc::new(EventDispatcher::new(
        &settings.event_handler,
        vec![Arc::new(LoggingEventHandler)],
    ));
    let handler = Arc::new(PupilHandler::new(
        watchdog.clone(),
        noc_client,
        events,
    ));

    let listener = Arc::new(PupilListener::new(
        settings.listener.clone(),
        handler,
        watchdog,
    ));
    let listener_stop = stop.clone();
    let listener_handle = tokio::spawn(async move {
        if let Err(e) = listener.serve(listener_stop).await {
            error!("pupil listener failed: {e}");
        }
    });

    info!("argus pupil started");

    // Either an OS signal or an internal stop request (exhausted NOC
    // retries) shuts the sidecar down.
    tokio::select! {
        _ = wait_for_shutdown_signal() => {}
        _ = stop.notified() => {
            info!("internal shutdown requested");
        }
    }
    stop.notify_waiters();

    if let Err(e) = tokio::time::timeout(SHUTDOWN_TIMEOUT, listener_handle).await {
        error!("pupil listener did not stop in time: {e}");
    }

    info!("argus pupil stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("received Ctrl+C signal");
            }
            _ = async {
                if let Ok(mut sigterm) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    let _ = sigterm.recv().await;
                    info!("received SIGTERM signal");
                }
            } => {}
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.ok();
        info!("received Ctrl+C signal");
    }
}

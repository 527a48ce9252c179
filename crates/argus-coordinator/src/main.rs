mod coordinator;
mod http;
mod state;
mod watchdog;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use argus_commons::models::settings_model::ArgusSettings;
use argus_commons::utils::circuit_breaker::CircuitBreaker;
use argus_commons::utils::logging::init_logging;
use argus_commons::utils::settings::{
    load_settings,
    otel_collector_endpoint,
};
use argus_k8s::client::KubePodLister;
use argus_k8s::pod_health::PodHealthChecker;
use argus_k8s::{
    GuardedPodClient,
    K8sLayerService,
    RestartTracker,
};
use argus_metrics::Metrics;
use argus_noc::{
    HttpNocTransport,
    NocQueue,
    NocSnapshotService,
    NocWorker,
    SuppressionCache,
};
use argus_vector::{
    AlertsPersistence,
    AlertsVector,
    BatchWriter,
    DistributedMap,
    HazelcastRestMap,
    InMemoryMap,
};
use log::{
    error,
    info,
    warn,
};
use tokio::signal;
use tokio::sync::Notify;

use crate::coordinator::Coordinator;
use crate::http::AppState;
use crate::watchdog::WatchdogService;

const SETTINGS_ENV: &str = "ARGUS_CONFIG";
const SETTINGS_DEFAULT_PATH: &str = "/etc/argus/settings.json";

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let settings: ArgusSettings = load_settings(SETTINGS_ENV, SETTINGS_DEFAULT_PATH)?;
    settings.validate().context("invalid settings")?;

    if let Some(endpoint) = otel_collector_endpoint() {
        info!("telemetry collector endpoint: {endpoint}");
    }

    let metrics = Arc::new(Metrics::new());
    let shutdown = Arc::new(Notify::new());

    // L2 layer. Without configured addresses the map degrades to a
    // process-local store and crash recovery cannot survive a restart.
    let map: Arc<dyn DistributedMap> = if settings.hazelcast.addresses.is_empty() {
        warn!("no Hazelcast addresses configured; L2 persistence is in-memory only");
        Arc::new(InMemoryMap::new())
    } else {
        Arc::new(HazelcastRestMap::new(settings.hazelcast.clone())?)
    };
    let l2_breaker = Arc::new(CircuitBreaker::new(
        "hazelcast",
        settings.hazelcast.circuit_breaker.to_breaker_settings(),
    ));
    let persistence = Arc::new(AlertsPersistence::new(
        map,
        l2_breaker,
        settings.hazelcast.clone(),
        metrics.clone(),
    ));

    let vector = Arc::new(AlertsVector::new(&settings.alerts_vector, metrics.clone()));
    let crash_recovery = vector.initialize_from_l2(&persistence).await;

    // Kubernetes layer.
    let k8s_breaker = Arc::new(CircuitBreaker::new(
        "kubernetes",
        settings.k8s_layer.circuit_breaker.to_breaker_settings(),
    ));
    let lister = Arc::new(
        KubePodLister::new(&settings.k8s_layer.kubernetes)
            .await
            .context("failed to build the Kubernetes client")?,
    );
    let pod_client = Arc::new(GuardedPodClient::new(
        lister,
        k8s_breaker.clone(),
        settings.k8s_layer.retry.clone(),
        settings.k8s_layer.kubernetes.api_timeout(),
        settings.k8s_layer.kubernetes.namespace.clone(),
    ));
    let tracker = Arc::new(RestartTracker::new(
        settings.k8s_layer.restart_tracking.clone(),
        crash_recovery,
    ));
    let k8s = Arc::new(K8sLayerService::new(
        PodHealthChecker::new(pod_client, tracker),
        settings.k8s_layer.clone(),
        k8s_breaker,
        metrics.clone(),
    ));

    // NOC pipeline.
    let queue = Arc::new(NocQueue::new(settings.noc.duplicate_window, metrics.clone()));
    let suppression = Arc::new(SuppressionCache::new(settings.noc.default_window));
    let transport = Arc::new(HttpNocTransport::new(
        &settings.noc_client,
        "argus-coordinator",
    )?);
    let snapshot = Arc::new(NocSnapshotService::new(
        vector.clone(),
        queue.clone(),
        metrics.clone(),
    ));
    let worker = NocWorker::new(
        queue.clone(),
        vector.clone(),
        suppression,
        transport,
        metrics.clone(),
        settings.noc.cleanup_interval,
        shutdown.clone(),
    );

    let batch_writer = BatchWriter::new(
        vector.clone(),
        persistence,
        settings.hazelcast.batch_window(),
        shutdown.clone(),
    );

    let watchdog = Arc::new(WatchdogService::new(
        settings.watchdog.clone(),
        vector.clone(),
        crash_recovery,
    ));

    let coordinator = Arc::new(Coordinator::new(
        settings.clone(),
        vector.clone(),
        watchdog.clone(),
        k8s.clone(),
        snapshot,
        metrics.clone(),
        shutdown.clone(),
    ));

    let worker_handle = tokio::spawn(async move { worker.run().await });
    let writer_handle = tokio::spawn(async move { batch_writer.run().await });

    let app_state = Arc::new(AppState {
        coordinator: coordinator.clone(),
        vector,
        watchdog,
        k8s,
        metrics,
    });
    let server_shutdown = shutdown.clone();
    let port = settings.listener.port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = http::serve(app_state, port, server_shutdown).await {
            error!("ingress HTTP server failed: {e}");
        }
    });

    coordinator.start().await;
    info!("argus coordinator started");

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");
    shutdown.notify_waiters();

    for (name, handle) in [
        ("NOC worker", worker_handle),
        ("batch writer", writer_handle),
        ("HTTP server", server_handle),
    ] {
        if let Err(e) = tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
            error!("{name} did not stop in time: {e}");
        }
    }

    info!("argus coordinator stopped");
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

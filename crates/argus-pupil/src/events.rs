use std::sync::Arc;
use std::time::Duration;

use argus_commons::models::settings_model::EventHandlerSettings;
use async_trait::async_trait;
use log::{
    debug,
    info,
    warn,
};
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::models::PupilRequest;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PupilEvent {
    Heartbeat,
    SendNoc,
}

/// Custom reaction to pupil traffic. Handlers run best-effort: a slow or
/// failing handler never blocks the listener response.
#[async_trait]
pub trait PupilEventHandler: Send + Sync {
    fn name(&self) -> &str;
    async fn on_heartbeat(&self, request: &PupilRequest);
    async fn on_send_noc(&self, request: &PupilRequest);
}

struct EventJob {
    event: PupilEvent,
    request: PupilRequest,
}

/// Fans events out to the registered handlers from a bounded queue
/// (2 x maxConcurrentHandlers, wait-on-full) with a per-handler timeout.
pub struct EventDispatcher {
    tx: mpsc::Sender<EventJob>,
}

impl EventDispatcher {
    pub fn new(
        settings: &EventHandlerSettings, handlers: Vec<Arc<dyn PupilEventHandler>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(2 * settings.max_concurrent_handlers);
        let rx = Arc::new(Mutex::new(rx));
        let handlers = Arc::new(handlers);
        let handler_timeout = settings.handler_timeout();

        for worker in 0..settings.max_concurrent_handlers {
            let rx = rx.clone();
            let handlers = handlers.clone();
            tokio::spawn(async move {
                loop {
                    let job = rx.lock().await.recv().await;
                    let Some(job) = job else {
                        debug!("event worker {worker} stopping");
                        break;
                    };
                    run_handlers(&handlers, &job, handler_timeout).await;
                }
            });
        }

        info!(
            "event dispatcher ready ({} handler(s), {} worker(s))",
            handlers.len(),
            settings.max_concurrent_handlers
        );
        EventDispatcher { tx }
    }

    /// Enqueues the event, waiting while the queue is full.
    pub async fn dispatch(&self, event: PupilEvent, request: PupilRequest) {
        if self.tx.send(EventJob { event, request }).await.is_err() {
            warn!("event workers are gone, dropping {event:?}");
        }
    }
}

async fn run_handlers(
    handlers: &[Arc<dyn PupilEventHandler>], job: &EventJob, handler_timeout: Duration,
) {
    for handler in handlers {
        let run = async {
            match job.event {
                PupilEvent::Heartbeat => handler.on_heartbeat(&job.request).await,
                PupilEvent::SendNoc => handler.on_send_noc(&job.request).await,
            }
        };
        if timeout(handler_timeout, run).await.is_err() {
            warn!(
                "event handler {:?} timed out after {handler_timeout:?} on {:?}",
                handler.name(),
                job.event
            );
        }
    }
}

/// Default handler: structured log lines for every event.
pub struct LoggingEventHandler;

#[async_trait]
impl PupilEventHandler for LoggingEventHandler {
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_heartbeat(&self, request: &PupilRequest) {
        debug!(
            "[{}] heartbeat from {:?}",
            request.correlation_id, request.noc_details.name
        );
    }

    async fn on_send_noc(&self, request: &PupilRequest) {
        info!(
            "[{}] NOC message relayed for {:?}",
            request.correlation_id, request.noc_details.name
        );
    }
}

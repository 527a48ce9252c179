use std::sync::Arc;

use log::debug;

use crate::events::{
    EventDispatcher,
    PupilEvent,
};
use crate::models::{
    MessageType,
    PupilRequest,
    PupilResponse,
};
use crate::noc_client::{
    PupilError,
    PupilNocClient,
};
use crate::watchdog::PupilWatchdog;

/// Routes typed pupil requests: heartbeats feed the watchdog, explicit NOC
/// messages go straight out. Event handlers observe both, best-effort.
pub struct PupilHandler {
    watchdog: Arc<PupilWatchdog>,
    noc_client: Arc<PupilNocClient>,
    events: Arc<EventDispatcher>,
}

impl PupilHandler {
    pub fn new(
        watchdog: Arc<PupilWatchdog>, noc_client: Arc<PupilNocClient>,
        events: Arc<EventDispatcher>,
    ) -> Self {
        PupilHandler {
            watchdog,
            noc_client,
            events,
        }
    }

    pub async fn handle(&self, request: PupilRequest) -> Result<PupilResponse, PupilError> {
        debug!(
            "[{}] handling {:?} request",
            request.correlation_id, request.message_type
        );

        match request.message_type {
            MessageType::Heartbeat => {
                self.watchdog.reset(
                    request.timeout_seconds,
                    request.noc_details.clone(),
                    &request.correlation_id,
                );
                let correlation_id = request.correlation_id.clone();
                self.events
                    .dispatch(PupilEvent::Heartbeat, request)
                    .await;
                Ok(PupilResponse::accepted(&correlation_id, "heartbeat recorded"))
            }
            MessageType::SendNocMessage => {
                self.noc_client
                    .send(&request.noc_details, &request.correlation_id)
                    .await?;
                let correlation_id = request.correlation_id.clone();
                self.events.dispatch(PupilEvent::SendNoc, request).await;
                Ok(PupilResponse::accepted(&correlation_id, "message delivered"))
            }
        }
    }
}

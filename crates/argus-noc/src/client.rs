use argus_commons::models::noc_model::NocMessage;
use argus_commons::models::settings_model::NocClientSettings;
use async_trait::async_trait;
use log::debug;
use thiserror::Error;

pub const HEADER_CORRELATION_ID: &str = "X-Correlation-ID";
pub const HEADER_SOURCE: &str = "X-Source";

#[derive(Debug, Error)]
pub enum NocError {
    #[error("NOC returned HTTP {0}")]
    Status(u16),

    #[error("NOC transport error: {0}")]
    Transport(String),
}

/// Seam over the NOC HTTP POST so the worker and the pupil can be tested
/// without a live endpoint. Any non-2xx response counts as a failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NocTransport: Send + Sync {
    async fn post(&self, message: &NocMessage) -> Result<(), NocError>;
    async fn post_batch(&self, messages: &[NocMessage]) -> Result<(), NocError>;
}

pub struct HttpNocTransport {
    http: reqwest::Client,
    endpoint: String,
    source: String,
}

impl HttpNocTransport {
    pub fn new(settings: &NocClientSettings, source: impl Into<String>) -> Result<Self, NocError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| NocError::Transport(e.to_string()))?;
        Ok(HttpNocTransport {
            http,
            endpoint: settings.endpoint.clone(),
            source: source.into(),
        })
    }

    async fn send<T: serde::Serialize + ?Sized>(
        &self, body: &T, correlation_id: &str,
    ) -> Result<(), NocError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(HEADER_CORRELATION_ID, correlation_id)
            .header(HEADER_SOURCE, &self.source)
            .json(body)
            .send()
            .await
            .map_err(|e| NocError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NocError::Status(response.status().as_u16()));
        }
        debug!("[{correlation_id}] NOC accepted message");
        Ok(())
    }
}

#[async_trait]
impl NocTransport for HttpNocTransport {
    async fn post(&self, message: &NocMessage) -> Result<(), NocError> {
        self.send(message, &message.correlation_id).await
    }

    async fn post_batch(&self, messages: &[NocMessage]) -> Result<(), NocError> {
        if messages.is_empty() {
            return Ok(());
        }
        let correlation_id = messages[0].correlation_id.clone();
        self.send(messages, &correlation_id).await
    }
}

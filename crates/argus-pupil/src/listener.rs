use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use argus_commons::models::settings_model::ListenerSettings;
use http_body_util::{
    BodyExt,
    Full,
};
use hyper::body::{
    Bytes,
    Incoming,
};
use hyper::service::service_fn;
use hyper::{
    Method,
    Request,
    Response,
    StatusCode,
};
use hyper_util::rt::TokioIo;
use log::{
    debug,
    error,
    info,
    warn,
};
use rustls::pki_types::{
    CertificateDer,
    PrivateKeyDer,
    PrivatePkcs1KeyDer,
    PrivatePkcs8KeyDer,
    PrivateSec1KeyDer,
};
use rustls::ServerConfig;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_rustls::TlsAcceptor;

use crate::handler::PupilHandler;
use crate::models::{
    PupilRequest,
    PupilResponse,
};
use crate::watchdog::PupilWatchdog;

pub const HEADER_API_KEY: &str = "X-API-Key";

/// HTTP(S) endpoint of the pupil sidecar.
pub struct PupilListener {
    settings: ListenerSettings,
    handler: Arc<PupilHandler>,
    watchdog: Arc<PupilWatchdog>,
}

impl PupilListener {
    pub fn new(
        settings: ListenerSettings, handler: Arc<PupilHandler>, watchdog: Arc<PupilWatchdog>,
    ) -> Self {
        PupilListener {
            settings,
            handler,
            watchdog,
        }
    }

    pub async fn serve(self: Arc<Self>, shutdown: Arc<Notify>) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.settings.port));
        let listener = TcpListener::bind(addr).await?;
        let tls = load_tls_acceptor(&self.settings)?;
        info!(
            "pupil listening on {addr} (https: {})",
            self.settings.use_https
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, remote)) => {
                            let listener = self.clone();
                            let tls = tls.clone();
                            tokio::spawn(async move {
                                listener.serve_connection(stream, remote, tls).await;
                            });
                        }
                        Err(e) => error!("failed to accept connection: {e}"),
                    }
                }
                _ = shutdown.notified() => {
                    info!("pupil listener shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn serve_connection(
        self: Arc<Self>, stream: tokio::net::TcpStream, remote: SocketAddr,
        tls: Option<TlsAcceptor>,
    ) {
        let listener = self.clone();
        let service = service_fn(move |request| {
            let listener = listener.clone();
            async move { listener.handle(request).await }
        });

        let result = match tls {
            Some(acceptor) => match acceptor.accept(stream).await {
                Ok(tls_stream) => {
                    hyper::server::conn::http1::Builder::new()
                        .serve_connection(TokioIo::new(tls_stream), service)
                        .await
                }
                Err(e) => {
                    warn!("TLS handshake with {remote} failed: {e}");
                    return;
                }
            },
            None => {
                hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
            }
        };
        if let Err(e) = result {
            debug!("connection from {remote} ended: {e}");
        }
    }

    async fn handle(
        &self, request: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let api_key = request
            .headers()
            .get(HEADER_API_KEY)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = match request.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("failed to read request body: {e}");
                Bytes::new()
            }
        };
        Ok(self.dispatch(&method, &path, api_key.as_deref(), body).await)
    }

    async fn dispatch(
        &self, method: &Method, path: &str, api_key: Option<&str>, body: Bytes,
    ) -> Response<Full<Bytes>> {
        if let Some(expected) = self.settings.api_key.as_deref() {
            if api_key != Some(expected) {
                warn!("rejecting request to {path}: missing or invalid API key");
                return json_response(
                    StatusCode::UNAUTHORIZED,
                    &PupilResponse::rejected("", "invalid API key"),
                );
            }
        }

        if method == Method::POST && path == self.settings.endpoint_path {
            return self.post_message(body).await;
        }
        if method == Method::GET && path == "/health" {
            return json_response(StatusCode::OK, &self.watchdog.status());
        }
        json_response(
            StatusCode::NOT_FOUND,
            &PupilResponse::rejected("", "not found"),
        )
    }

    async fn post_message(&self, body: Bytes) -> Response<Full<Bytes>> {
        let request: PupilRequest = match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => {
                warn!("rejecting pupil request with invalid body: {e}");
                return json_response(
                    StatusCode::BAD_REQUEST,
                    &PupilResponse::rejected("", format!("invalid request body: {e}")),
                );
            }
        };

        let correlation_id = request.correlation_id.clone();
        match self.handler.handle(request).await {
            Ok(response) => json_response(StatusCode::OK, &response),
            Err(e) => {
                error!("[{correlation_id}] request failed: {e}");
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &PupilResponse::rejected(&correlation_id, e.to_string()),
                )
            }
        }
    }
}

/// Builds the TLS acceptor from PEM certificate material when HTTPS is
/// enabled.
fn load_tls_acceptor(settings: &ListenerSettings) -> anyhow::Result<Option<TlsAcceptor>> {
    if !settings.use_https {
        return Ok(None);
    }
    if settings.certificate_password.is_some() {
        warn!("certificatePassword is ignored for PEM certificate material");
    }

    let path = settings
        .certificate_path
        .as_deref()
        .context("useHttps requires certificatePath")?;
    let raw = std::fs::read(path).with_context(|| format!("failed to read certificate {path}"))?;
    let blocks = pem::parse_many(&raw).context("failed to parse PEM certificate")?;

    let mut certs: Vec<CertificateDer<'static>> = Vec::new();
    let mut key: Option<PrivateKeyDer<'static>> = None;
    for block in blocks {
        let tag = block.tag().to_string();
        match tag.as_str() {
            "CERTIFICATE" => certs.push(CertificateDer::from(block.into_contents())),
            "PRIVATE KEY" => {
                key = Some(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
                    block.into_contents(),
                )))
            }
            "RSA PRIVATE KEY" => {
                key = Some(PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(
                    block.into_contents(),
                )))
            }
            "EC PRIVATE KEY" => {
                key = Some(PrivateKeyDer::Sec1(PrivateSec1KeyDer::from(
                    block.into_contents(),
                )))
            }
            other => debug!("ignoring PEM block {other:?} in {path}"),
        }
    }

    let key = key.with_context(|| format!("no private key found in {path}"))?;
    if certs.is_empty() {
        anyhow::bail!("no certificate found in {path}");
    }

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid certificate or key")?;
    Ok(Some(TlsAcceptor::from(Arc::new(config))))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let encoded = match serde_json::to_vec(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!("failed to encode response body: {e}");
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            return response;
        }
    };
    let mut response = Response::new(Full::new(Bytes::from(encoded)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{
        AtomicU32,
        Ordering,
    };

    use argus_commons::models::noc_model::NocMessage;
    use argus_commons::models::settings_model::{
        EventHandlerSettings,
        NocClientSettings,
        PersistenceSettings,
        WatchdogSettings,
    };
    use argus_noc::{
        NocError,
        NocTransport,
    };
    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::events::EventDispatcher;
    use crate::noc_client::PupilNocClient;
    use crate::recovery::RecoveryStore;

    use super::*;

    struct OkTransport {
        posts: AtomicU32,
    }

    #[async_trait]
    impl NocTransport for OkTransport {
        async fn post(&self, _message: &NocMessage) -> Result<(), NocError> {
            self.posts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn post_batch(&self, _messages: &[NocMessage]) -> Result<(), NocError> {
            Ok(())
        }
    }

    fn listener_with(dir: &std::path::Path, api_key: Option<&str>) -> Arc<PupilListener> {
        let transport = Arc::new(OkTransport {
            posts: AtomicU32::new(0),
        });
        let recovery = Arc::new(RecoveryStore::new(&PersistenceSettings {
            storage_path: dir.to_string_lossy().to_string(),
            recovery_file_name: "noc-recovery.json".to_string(),
        }));
        let client = Arc::new(PupilNocClient::new(
            transport,
            NocClientSettings {
                endpoint: "https://noc.example.com".to_string(),
                ..NocClientSettings::default()
            },
            recovery,
            Arc::new(Notify::new()),
        ));
        let watchdog = Arc::new(PupilWatchdog::new(
            WatchdogSettings::default(),
            client.clone(),
        ));
        let events = Arc::new(EventDispatcher::new(
            &EventHandlerSettings::default(),
            vec![],
        ));
        let handler = Arc::new(PupilHandler::new(watchdog.clone(), client, events));

        Arc::new(PupilListener::new(
            ListenerSettings {
                port: 8443,
                endpoint_path: "/api/v1/messages".to_string(),
                api_key: api_key.map(str::to_string),
                ..ListenerSettings::default()
            },
            handler,
            watchdog,
        ))
    }

    fn heartbeat_body() -> Bytes {
        Bytes::from(
            r#"{
                "messageType": "Heartbeat",
                "correlationId": "hb-00000001",
                "timestamp": "2024-01-01T00:00:00Z",
                "nocDetails": {"name": "WorkerSilent"}
            }"#,
        )
    }

    #[tokio::test]
    async fn test_heartbeat_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let listener = listener_with(dir.path(), None);

        let response = listener
            .dispatch(&Method::POST, "/api/v1/messages", None, heartbeat_body())
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let decoded: PupilResponse = serde_json::from_slice(&body).unwrap();
        assert!(decoded.accepted);
        assert_eq!(decoded.correlation_id, "hb-00000001");
    }

    #[tokio::test]
    async fn test_invalid_body_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let listener = listener_with(dir.path(), None);

        let response = listener
            .dispatch(
                &Method::POST,
                "/api/v1/messages",
                None,
                Bytes::from("{ nope"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_api_key_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let listener = listener_with(dir.path(), Some("secret"));

        let denied = listener
            .dispatch(&Method::POST, "/api/v1/messages", None, heartbeat_body())
            .await;
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let wrong = listener
            .dispatch(
                &Method::POST,
                "/api/v1/messages",
                Some("nope"),
                heartbeat_body(),
            )
            .await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let allowed = listener
            .dispatch(
                &Method::POST,
                "/api/v1/messages",
                Some("secret"),
                heartbeat_body(),
            )
            .await;
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_route() {
        let dir = tempfile::tempdir().unwrap();
        let listener = listener_with(dir.path(), None);

        let response = listener
            .dispatch(&Method::GET, "/health", None, Bytes::new())
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let unknown = listener
            .dispatch(&Method::GET, "/nope", None, Bytes::new())
            .await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_tls_disabled_returns_none() {
        let acceptor = load_tls_acceptor(&ListenerSettings::default()).expect("no tls");
        assert!(acceptor.is_none());
    }
}

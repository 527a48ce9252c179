use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use argus_commons::models::push_model::PushAlert;
use argus_commons::utils::correlation::correlation_id;
use argus_k8s::K8sLayerService;
use argus_metrics::Metrics;
use argus_vector::AlertsVector;
use http_body_util::{
    BodyExt,
    Full,
};
use hyper::body::{
    Bytes,
    Incoming,
};
use hyper::header::HeaderValue;
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
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::coordinator::Coordinator;
use crate::state::ArgusState;
use crate::watchdog::WatchdogService;

pub const HEADER_CORRELATION_ID: &str = "X-Correlation-ID";

pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub vector: Arc<AlertsVector>,
    pub watchdog: Arc<WatchdogService>,
    pub k8s: Arc<K8sLayerService>,
    pub metrics: Arc<Metrics>,
}

pub async fn serve(state: Arc<AppState>, port: u16, shutdown: Arc<Notify>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("ingress HTTP server listening on {addr}");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, remote)) => {
                        let state = state.clone();
                        tokio::spawn(async move {
                            let service =
                                service_fn(move |request| handle(state.clone(), request));
                            if let Err(e) = hyper::server::conn::http1::Builder::new()
                                .serve_connection(TokioIo::new(stream), service)
                                .await
                            {
                                debug!("connection from {remote} ended: {e}");
                            }
                        });
                    }
                    Err(e) => error!("failed to accept connection: {e}"),
                }
            }
            _ = shutdown.notified() => {
                info!("ingress HTTP server shutting down");
                break;
            }
        }
    }
    Ok(())
}

async fn handle(
    state: Arc<AppState>, request: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let correlation = request
        .headers()
        .get(HEADER_CORRELATION_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| correlation_id("push"));

    let body = match request.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("[{correlation}] failed to read request body: {e}");
            Bytes::new()
        }
    };

    let mut response = dispatch(&state, &method, &path, body, &correlation).await;
    if let Ok(value) = HeaderValue::from_str(&correlation) {
        response.headers_mut().insert(HEADER_CORRELATION_ID, value);
    }
    Ok(response)
}

async fn dispatch(
    state: &AppState, method: &Method, path: &str, body: Bytes, correlation: &str,
) -> Response<Full<Bytes>> {
    if method == Method::POST && path == "/api/v2/alerts" {
        return post_alerts(state, body, correlation);
    }
    if method != Method::GET {
        return text_response(StatusCode::NOT_FOUND, "not found");
    }

    match path {
        "/api/health" => json_response(StatusCode::OK, &argus_state(state)),
        "/api/watchdog" => json_response(StatusCode::OK, &state.watchdog.status()),
        "/api/alerts" => json_response(StatusCode::OK, &state.vector.get_snapshot()),
        "/api/k8s/health" => match state.coordinator.last_layer_state() {
            Some(layer) => json_response(StatusCode::OK, &layer),
            None => json_response(StatusCode::OK, &serde_json::json!({"status": "PENDING"})),
        },
        "/api/k8s/circuit-breaker" => json_response(
            StatusCode::OK,
            &serde_json::json!({"state": state.k8s.breaker_state().as_str()}),
        ),
        "/livez" => text_response(StatusCode::OK, "ok"),
        "/readyz" => readyz(state),
        "/metrics" => metrics_text(state),
        _ => text_response(StatusCode::NOT_FOUND, "not found"),
    }
}

fn post_alerts(state: &AppState, body: Bytes, correlation: &str) -> Response<Full<Bytes>> {
    let alerts: Vec<PushAlert> = match serde_json::from_slice(&body) {
        Ok(alerts) => alerts,
        Err(e) => {
            warn!("[{correlation}] rejecting push with invalid JSON: {e}");
            state.metrics.inc_invalid_requests();
            return text_response(StatusCode::BAD_REQUEST, "invalid alert payload");
        }
    };

    state.coordinator.receive_alerts(alerts, correlation);
    text_response(StatusCode::OK, "")
}

fn readyz(state: &AppState) -> Response<Full<Bytes>> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| argus_state(state))) {
        Ok(_) => text_response(StatusCode::OK, "ready"),
        Err(_) => {
            error!("readiness probe hit an internal error");
            text_response(StatusCode::SERVICE_UNAVAILABLE, "not ready")
        }
    }
}

fn metrics_text(state: &AppState) -> Response<Full<Bytes>> {
    let mut body = String::from(
        "# NOTE: /metrics is deprecated; metrics ship through the OpenTelemetry collector.\n",
    );
    body.push_str(&state.metrics.encode_text());
    text_response(StatusCode::OK, &body)
}

fn argus_state(state: &AppState) -> ArgusState {
    ArgusState {
        status: "ok".to_string(),
        crash_recovery: state.vector.crash_recovery(),
        vector_size: state.vector.len(),
        watchdog: state.watchdog.status(),
        k8s_layer: state.coordinator.last_layer_state(),
        last_alert_received_at: state.coordinator.last_alert_received_at(),
        metrics: state.metrics.snapshot(),
    }
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(encoded) => {
            let mut response = Response::new(Full::new(Bytes::from(encoded)));
            *response.status_mut() = status;
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(e) => {
            error!("failed to encode response body: {e}");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "encoding error")
        }
    }
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum K8sError {
    #[error("Kubernetes error: {0}")]
    Api(#[from] kube::Error),

    #[error("Kubernetes config error: {0}")]
    Config(String),

    #[error("Kubernetes API call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Kubernetes API circuit breaker is open")]
    CircuitOpen,

    #[error("Kubernetes API retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

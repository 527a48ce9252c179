use uuid::Uuid;

/// Builds a correlation ID of the form `<prefix>-<8hex>`, e.g. `poll-3fa9c1d2`.
pub fn correlation_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &id[..8])
}

/// Lifecycle-scoped trace correlator attached to one logical alert event.
pub fn execution_id() -> String {
    correlation_id("exec")
}

use std::sync::Once;

use env_logger::Env;

static INIT: Once = Once::new();

/// Initialises env_logger once per process, defaulting to `info` when
/// `RUST_LOG` is unset. Safe to call from tests and binaries alike.
pub fn init_logging() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    });
}

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static LOGGER_INIT: Once = Once::new();

/// Installs a tracing subscriber for unit tests, honouring `RUST_LOG`.
pub(crate) fn enable_logger() {
    LOGGER_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

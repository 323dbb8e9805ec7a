//! Diagnostic logging setup
//!
//! Installs a `tracing` subscriber that writes to stderr, so command output
//! on stdout stays machine-readable. Filtering follows `RUST_LOG`; without
//! it only warnings and errors are shown.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT_ONCE: Once = Once::new();

const DEFAULT_FILTER: &str = "warn";

/// Initialize logging; later calls are no-ops
pub fn init_logging() {
    INIT_ONCE.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // A subscriber installed by an embedding application takes precedence
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}

/// Install `verbose` as the filter when `RUST_LOG` is unset
pub fn init_logging_with_level(verbose: bool) {
    if verbose && std::env::var_os("RUST_LOG").is_none() {
        INIT_ONCE.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new("changeslog=debug"))
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init();
        });
    }
    init_logging();
}

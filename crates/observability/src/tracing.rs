//! Subscriber initialization.
//!
//! Both entry points read `RUST_LOG`; the default filter differs.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";
const DEFAULT_TEST_FILTER: &str = "orderdesk_infra=debug";

fn filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// JSON lines with timestamps, span fields flattened onto each event.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(DEFAULT_FILTER))
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Compact output routed through libtest's capture.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(DEFAULT_TEST_FILTER))
        .with_test_writer()
        .compact()
        .try_init();
}

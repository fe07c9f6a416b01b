//! Tracing setup shared by binaries and tests.

/// Subscriber initialization (filters, formatting).
pub mod tracing;

/// Initialize process-wide JSON logging.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize human-readable logging captured by the test harness.
pub fn init_test() {
    tracing::init_test();
}

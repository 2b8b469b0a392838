//! Structured logging setup.
//!
//! The crate itself only emits `tracing` events; which subscriber collects
//! them is the embedding application's choice. These helpers cover the
//! common case of a formatted stderr subscriber filtered by `RUST_LOG`.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a formatted stderr subscriber honoring `RUST_LOG`.
///
/// Does nothing if a global subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Install a formatted stderr subscriber at a fixed level.
pub fn init_with_level(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

//! # Telemetry
//!
//! Tracing subscriber setup for the embedding shell.

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// Called once by the shell at startup. Honors `RUST_LOG`; defaults to
/// info-level output with debug detail for the engine crates. Calling it
/// twice is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atrium=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

//! Structured logging setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies. Logs go
//! to stderr so stdout carries only the transcript output.

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber. A second call is a no-op.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

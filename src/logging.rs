//! Tracing subscriber setup for the `gfit` binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is left to
//! the binary so embedding applications keep control of their own logging.

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `warn` when
/// `quiet` is requested. Calling this twice is harmless (the second call is a
/// no-op), which keeps tests that drive `app` functions simple.
pub fn init(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

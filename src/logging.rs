//! Log setup for the `shell-conform` binary
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to whoever embeds it. The binary writes to stderr so stdout carries only
//! the report.

use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive
pub const LOG_ENV: &str = "SHELL_CONFORM_LOG";

/// Filter from `SHELL_CONFORM_LOG`, else `debug` when verbose, else `warn`
pub fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }))
}

/// Install the global subscriber; later calls are ignored
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

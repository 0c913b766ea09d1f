//! Logging setup

use tracing_subscriber::EnvFilter;

use lmpipe_core::{Error, Result};

/// `RUST_LOG` wins; otherwise `debug` when verbose, `info` when not
pub fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }))
}

/// Install the global fmt subscriber, writing to stderr so reports on stdout stay clean
pub fn init_logging(verbose: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::Configuration(format!("Failed to initialise logging: {}", e)))
}

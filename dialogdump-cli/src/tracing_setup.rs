//! Tracing setup for the dialogdump CLI
//!
//! Usage:
//!   dialogdump --debug backup ...          # Debug logging to stderr
//!   RUST_LOG=dialogdump_core=trace ...     # Fine-grained log control
//!
//! Logs always go to stderr so `status --json` output stays machine readable.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Enable debug logging (sets RUST_LOG=debug if not already set)
    pub debug: bool,
    /// Only warnings and errors unless RUST_LOG says otherwise
    pub quiet: bool,
}

pub fn init(config: &TracingConfig) -> Result<()> {
    let default_level = if config.debug {
        "debug"
    } else if config.quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug) // Show targets in debug mode
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

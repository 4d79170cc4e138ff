use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ResolverError, Result};

/// Install a global fmt subscriber. `RUST_LOG` overrides the configured
/// filter. Fails if a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            ResolverError::Config(format!("invalid logging filter '{}': {e}", config.filter))
        })?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| ResolverError::Config(format!("failed to install tracing subscriber: {e}")))
}

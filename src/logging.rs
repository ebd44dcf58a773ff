//! # Logging
//!
//! Installs a `tracing-subscriber` fmt subscriber filtered by the
//! configured level. `RUST_LOG` overrides the configuration when set.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Build the filter: `RUST_LOG` if present and valid, else the configured
/// level
pub fn filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber
///
/// # Returns
///
/// * `bool` - `false` if a subscriber was already installed; the existing
///   one stays in place
pub fn init(config: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(config))
        .with_target(false)
        .try_init()
        .is_ok()
}

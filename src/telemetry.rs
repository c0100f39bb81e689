//! Tracing subscriber initialization
//!
//! The library only emits `tracing` events; binaries and tests decide where
//! they go. `RUST_LOG` wins over the configured level when set.

use quiver_core::{Error, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG` or `level`.
///
/// # Errors
///
/// Returns [`Error::Config`] if `level` is not a valid filter directive or
/// a global subscriber is already installed.
pub fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| Error::config(format!("Invalid log level '{}': {}", level, e)))?,
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| Error::config(format!("Logging already initialized: {}", e)))
}

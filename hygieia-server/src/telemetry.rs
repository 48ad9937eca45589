//! Tracing subscriber setup.

use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LogFormat;

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
///
/// # Errors
///
/// Fails when `level` is not a valid filter or a subscriber is already installed.
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|err| anyhow!("invalid log level `{level}`: {err}"))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Compact => registry.with(fmt::layer().with_target(false).compact()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    installed.map_err(|err| anyhow!("failed to set tracing subscriber: {err}"))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "telemetry initialized");
    Ok(())
}

//! Telemetry initialisation for the `fieldcrypt` binary.
//!
//! Structured JSON logs only, written to stderr so stdout carries nothing but
//! protocol lines.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Level used by commands that run without settings, such as `keygen`.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Pick the log filter: the `--log-level` flag, then the configured
/// `LOG_LEVEL`, then [`DEFAULT_LOG_LEVEL`].
pub fn log_level<'a>(flag: Option<&'a str>, configured: Option<&'a str>) -> &'a str {
    flag.or(configured).unwrap_or(DEFAULT_LOG_LEVEL)
}

/// Initialise the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `log_level` when set.
///
/// # Errors
///
/// Returns an error if `log_level` is not a valid filter or the subscriber
/// has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => filter(log_level)?,
    };

    tracing_subscriber::fmt()
        .json()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise fieldcrypt tracing subscriber: {e}"))
}

fn filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(log_level).with_context(|| format!("invalid log level {log_level:?}"))
}

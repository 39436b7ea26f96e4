//! Logging setup for the `pgjsonl` binary.
//!
//! The library only emits `tracing` events; this is the one place a
//! subscriber is installed.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::error::{AppError, Result};

/// Diagnostic output style on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event, for `--json` runs.
    Json,
}

/// Default filter directive for the verbosity flags.
///
/// `-q` wins over `-v`.
#[must_use]
pub const fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, replaces the directive derived from the flags.
///
/// # Errors
///
/// Returns `Config` if `RUST_LOG` is malformed or a subscriber is already
/// installed.
pub fn init_logging(verbose: u8, quiet: bool, format: LogFormat) -> Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(spec) if !spec.trim().is_empty() => EnvFilter::try_new(spec)
            .map_err(|e| AppError::config(format!("invalid RUST_LOG: {e}")))?,
        _ => EnvFilter::new(default_directive(verbose, quiet)),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbose >= 2),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| AppError::config(format!("failed to install logger: {e}")))
}

//! Tracing subscriber setup for the `keyward` binary
//!
//! Logs go to stderr. The filter comes from `--log-level` when given, then
//! `RUST_LOG`, then [`DEFAULT_FILTER`].

use std::io;

use clap::ValueEnum;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when neither `--log-level` nor `RUST_LOG` is set
pub const DEFAULT_FILTER: &str = "info,tower_http=info";

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

fn filter(level: Option<&str>) -> io::Result<EnvFilter> {
    match level {
        Some(directive) => EnvFilter::try_new(directive).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid log filter '{directive}': {e}"),
            )
        }),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if `level` is not a valid filter directive or a global
/// subscriber is already installed.
pub fn init(level: Option<&str>, format: LogFormat) -> io::Result<()> {
    let subscriber = tracing_subscriber::registry().with(filter(level)?);

    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string())),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string())),
    }
}

//! Tracing subscriber setup.
//!
//! `logging.level` applies to the relaycache crates; dependencies (reqwest,
//! hyper, redis) stay at `warn` unless `RUST_LOG` says otherwise.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;
use crate::error::{CoreError, Result};

/// Crate targets that follow `logging.level`.
const TARGETS: [&str; 5] = [
    "relaycache",
    "relaycache_cli",
    "relaycache_core",
    "relaycache_engine",
    "relaycache_storage",
];

/// Builds the filter for a configured level. `RUST_LOG` wins when set.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
    }

    let level = level.to_ascii_lowercase();
    let directives = TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",");

    EnvFilter::try_new(format!("warn,{directives}"))
        .map_err(|e| CoreError::configuration(format!("invalid logging.level {level:?}: {e}")))
}

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable. A second call keeps the first subscriber.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&logging.level)?;

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
    Ok(())
}

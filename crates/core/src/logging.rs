//! Structured logging infrastructure for AttestBridge.
//!
//! This module provides centralized logging initialization with support
//! for structured JSON output and environment-based configuration.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::CoreError;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Initialize the logging system with structured output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level. Returns `Ok(false)` when a
/// subscriber was already installed by this module.
///
/// # Example
/// ```no_run
/// use attestbridge_core::logging;
///
/// logging::init().expect("logging");
/// tracing::info!("Application started");
/// ```
pub fn init() -> Result<bool, CoreError> {
    try_init_with(&LoggingConfig::default())
}

/// Initialize the logging system with JSON output for production environments.
///
/// # Example
/// ```no_run
/// use attestbridge_core::logging;
///
/// logging::init_json().expect("logging");
/// tracing::info!(provider = "stub", "Service started");
/// ```
pub fn init_json() -> Result<bool, CoreError> {
    try_init_with(&LoggingConfig {
        json: true,
        ..LoggingConfig::default()
    })
}

/// Install a subscriber described by `config`, tolerating one that is
/// already installed.
///
/// Host bridges may load the library more than once per process, so a second
/// call returns `Ok(false)` instead of panicking. Output goes to stderr;
/// stdout is left to the caller.
pub fn try_init_with(config: &LoggingConfig) -> Result<bool, CoreError> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(false);
    }

    let filter = filter_or(&config.level);

    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) => {
            INSTALLED.store(false, Ordering::SeqCst);
            Err(CoreError::Logging(e.to_string()))
        }
    }
}

fn filter_or(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_falls_back_on_bad_level() {
        let _ = filter_or("not a [valid filter");
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let config = LoggingConfig::default();
        assert!(try_init_with(&config).unwrap());
        assert!(!try_init_with(&config).unwrap());
        assert!(!init().unwrap());
        assert!(!init_json().unwrap());
    }
}

//! Core error types

use thiserror::Error;

/// Core error type for AttestBridge
#[derive(Debug, Error)]
pub enum CoreError {
    /// Logging subscriber could not be installed
    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

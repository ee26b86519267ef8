//! Error types for attestation providers and the dispatch service.
//!
//! Provider failures are raised on the worker side of the dispatch boundary;
//! the service folds them, together with panics and timeouts, into a single
//! [`Fault`] that travels inside a failure notification.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::service::Operation;

/// Errors raised by a [`PlatformProvider`](crate::PlatformProvider).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The secure subsystem or its runtime handle could not be obtained.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider was reached but reported a failure, including malformed
    /// responses and type mismatches while decoding them.
    #[error("{0}")]
    Failed(String),

    /// The active provider does not implement this capability.
    #[error("{operation} is not supported by the {provider} provider")]
    Unsupported {
        operation: &'static str,
        provider: &'static str,
    },
}

impl ProviderError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Unavailable(_) => FaultKind::ProviderUnavailable,
            Self::Failed(_) => FaultKind::ProviderError,
            Self::Unsupported { .. } => FaultKind::UnsupportedOperation,
        }
    }
}

/// Classification carried by every failure notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    ProviderUnavailable,
    ProviderError,
    UnsupportedOperation,
    /// Anything caught at the dispatch boundary that the provider did not
    /// report itself, such as a panic on the worker.
    UnknownFault,
    TimedOut,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProviderUnavailable => "provider_unavailable",
            Self::ProviderError => "provider_error",
            Self::UnsupportedOperation => "unsupported_operation",
            Self::UnknownFault => "unknown_fault",
            Self::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// A failed request as delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    /// Human-readable message, prefixed with the failed operation.
    pub message: String,
}

impl Fault {
    pub fn from_provider(operation: Operation, error: &ProviderError) -> Self {
        Self {
            kind: error.kind(),
            message: format!("{}: {}", operation.failure_prefix(), error),
        }
    }

    pub fn unknown(operation: Operation, detail: Option<&str>) -> Self {
        let message = match detail {
            Some(detail) => format!("{}: {}", operation.failure_prefix(), detail),
            None => format!(
                "Unknown error occurred while {}",
                operation.progressive_description()
            ),
        };
        Self {
            kind: FaultKind::UnknownFault,
            message,
        }
    }

    pub fn timed_out(operation: Operation, limit_ms: u64) -> Self {
        Self {
            kind: FaultKind::TimedOut,
            message: format!(
                "{}: provider did not respond within {} ms",
                operation.failure_prefix(),
                limit_ms
            ),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Errors raised by the service and the process-scoped registry.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("attestation service is not initialized")]
    NotInitialized,

    #[error("attestation service is already initialized")]
    AlreadyInitialized,

    #[error("failed to start dispatch runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("provider selection failed: {0}")]
    ProviderSelection(String),

    #[error("configuration error: {0}")]
    Config(#[from] attestbridge_core::ConfigError),
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_kinds() {
        assert_eq!(
            ProviderError::unavailable("no vm").kind(),
            FaultKind::ProviderUnavailable
        );
        assert_eq!(ProviderError::failed("boom").kind(), FaultKind::ProviderError);
        assert_eq!(
            ProviderError::Unsupported {
                operation: "request_integrity_token",
                provider: "stub",
            }
            .kind(),
            FaultKind::UnsupportedOperation
        );
    }

    #[test]
    fn test_fault_messages_name_the_operation() {
        let fault = Fault::from_provider(
            Operation::ResetKey,
            &ProviderError::failed("keystore rejected delete"),
        );
        assert_eq!(fault.kind, FaultKind::ProviderError);
        assert_eq!(fault.message, "Failed to reset key: keystore rejected delete");

        let fault = Fault::unknown(Operation::GenerateAttestation, None);
        assert_eq!(
            fault.message,
            "Unknown error occurred while generating attestation"
        );

        let fault = Fault::timed_out(Operation::RequestIntegrityToken, 250);
        assert_eq!(fault.kind, FaultKind::TimedOut);
        assert!(fault.message.starts_with("Failed to request integrity token"));
    }
}

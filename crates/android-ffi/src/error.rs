use attestbridge_attestation::{ProviderError, ServiceError};
use attestbridge_core::ConfigError;
use thiserror::Error;

/// Failures of a single JNI round trip.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to attach thread to the JVM: {0}")]
    Attach(jni::errors::Error),

    #[error("JNI bridge is not initialized")]
    NotInitialized,

    #[error("{method} threw {message}")]
    JavaException {
        method: &'static str,
        message: String,
    },

    #[error("{0}")]
    Marshal(String),

    #[error("JNI call failed: {0}")]
    Jni(#[from] jni::errors::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl BridgeError {
    pub fn marshal(message: impl Into<String>) -> Self {
        Self::Marshal(message.into())
    }
}

impl From<BridgeError> for ProviderError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Attach(_)
            | BridgeError::NotInitialized
            | BridgeError::Config(_)
            | BridgeError::Service(_) => {
                ProviderError::unavailable(error.to_string())
            }
            BridgeError::JavaException { .. } | BridgeError::Marshal(_) | BridgeError::Jni(_) => {
                ProviderError::failed(error.to_string())
            }
        }
    }
}

//! Device attestation and integrity tokens for the AttestBridge runtime.
//!
//! This crate exposes one asynchronous attestation service over a
//! platform-specific provider. Callers never block: every operation returns a
//! request id and its outcome is delivered later on a completion queue that
//! the caller drains on its own thread.
//!
//! # Core Concepts
//!
//! - **Provider**: the platform collaborator doing the actual work. Hardware
//!   (through a foreign bridge to the secure subsystem), stub (platforms with
//!   no secure subsystem) or cloud (integrity tokens from an HTTPS endpoint).
//! - **Dispatch boundary**: every provider call runs on a blocking worker;
//!   errors, panics and timeouts are folded into a failure notification.
//! - **Completion queue**: the single consumer of request outcomes.
//!
//! # Security Model
//!
//! The stub provider is never a security boundary. It returns fixed public
//! data, reports `is_hardware_backed = false` and refuses to produce
//! integrity tokens.

pub mod error;
pub mod provider;
pub mod registry;
pub mod result;
pub mod service;

pub use error::{Fault, FaultKind, ProviderError, ServiceError, ServiceResult};
#[cfg(feature = "cloud")]
pub use provider::CloudIntegrityProvider;
pub use provider::{
    ForeignBridge, ForeignRecord, ForeignValue, HardwareProvider, PlatformProvider, ProviderKind,
    StubProvider, DEFAULT_CLOUD_PROJECT_ID,
};
pub use result::{AttestationResult, AttestationResultBuilder, FieldValue};
pub use service::{
    AttestationListener, AttestationService, AttestationServiceBuilder, CompletionQueue,
    LifecycleError, Notification, Operation, RequestId, RequestLifecycle, RequestPhase,
};

// Re-export core types for convenience
pub use attestbridge_core::{Config, ProviderSelection};

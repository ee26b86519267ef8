//! Asynchronous attestation service.
//!
//! Every operation returns a [`RequestId`] at once and runs the provider on a
//! blocking worker. Its outcome arrives later, exactly once, on the
//! [`CompletionQueue`] handed out when the service was built.

mod completion;
mod dispatch;
mod lifecycle;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use attestbridge_core::Config;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::error::{ProviderError, ServiceResult};
use crate::provider::{self, ForeignBridge, PlatformProvider, ProviderKind};

pub use completion::{AttestationListener, CompletionQueue, Notification};
pub use lifecycle::{LifecycleError, RequestLifecycle, RequestPhase};

use completion::CompletionSender;
use dispatch::Dispatcher;

const DEFAULT_WORKER_THREADS: usize = 2;

/// Identifier of one dispatched request, unique per service instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The four public operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    GenerateAttestation,
    CheckHardwareBacked,
    ResetKey,
    RequestIntegrityToken,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateAttestation => "generate_attestation",
            Self::CheckHardwareBacked => "check_hardware_backed",
            Self::ResetKey => "reset_key",
            Self::RequestIntegrityToken => "request_integrity_token",
        }
    }

    /// Leading text of every failure message for this operation.
    pub fn failure_prefix(&self) -> &'static str {
        match self {
            Self::GenerateAttestation => "Failed to generate attestation",
            Self::CheckHardwareBacked => "Failed to check hardware support",
            Self::ResetKey => "Failed to reset key",
            Self::RequestIntegrityToken => "Failed to request integrity token",
        }
    }

    pub fn progressive_description(&self) -> &'static str {
        match self {
            Self::GenerateAttestation => "generating attestation",
            Self::CheckHardwareBacked => "checking hardware support",
            Self::ResetKey => "resetting key",
            Self::RequestIntegrityToken => "requesting integrity token",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct AttestationService {
    provider: Arc<dyn PlatformProvider>,
    dispatcher: Dispatcher,
    completions: CompletionSender,
    next_request_id: AtomicU64,
}

impl AttestationService {
    pub fn builder(provider: Arc<dyn PlatformProvider>) -> AttestationServiceBuilder {
        AttestationServiceBuilder::new(provider)
    }

    /// Service with its own dispatch runtime and no timeout.
    pub fn new(provider: Arc<dyn PlatformProvider>) -> ServiceResult<(Self, CompletionQueue)> {
        Self::builder(provider).build()
    }

    /// Select the provider from `config` and build the service around it.
    pub fn from_config(
        config: &Config,
        foreign: Option<Arc<dyn ForeignBridge>>,
    ) -> ServiceResult<(Self, CompletionQueue)> {
        config.validate()?;
        let provider = provider::from_config(config, foreign)?;
        Self::builder(provider)
            .worker_threads(config.dispatch.worker_threads)
            .timeout(config.dispatch.timeout_ms.map(Duration::from_millis))
            .build()
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    pub fn dispatch_timeout(&self) -> Option<Duration> {
        self.dispatcher.timeout()
    }

    fn next_request(&self, operation: Operation) -> RequestId {
        let request_id = RequestId(self.next_request_id.fetch_add(1, Ordering::Relaxed));
        debug!(
            request_id = %request_id,
            operation = %operation,
            provider = %self.provider.kind(),
            "Dispatching request"
        );
        request_id
    }

    /// Outcome: `AttestationGenerated` or `AttestationError`.
    pub fn generate_attestation(&self) -> RequestId {
        let operation = Operation::GenerateAttestation;
        let request_id = self.next_request(operation);
        let provider = Arc::clone(&self.provider);
        self.dispatcher.dispatch(
            request_id,
            operation,
            self.completions.clone(),
            move || provider.generate_attestation(),
            |request_id, result| Notification::AttestationGenerated { request_id, result },
        );
        request_id
    }

    /// Outcome: `HardwareBackedResult`, or `AttestationError` if the worker
    /// itself fails.
    pub fn check_hardware_backed(&self) -> RequestId {
        let operation = Operation::CheckHardwareBacked;
        let request_id = self.next_request(operation);
        let provider = Arc::clone(&self.provider);
        self.dispatcher.dispatch(
            request_id,
            operation,
            self.completions.clone(),
            move || Ok(provider.is_hardware_backed_available()),
            |request_id, available| Notification::HardwareBackedResult {
                request_id,
                available,
            },
        );
        request_id
    }

    /// Outcome: `KeyResetComplete` or `AttestationError`.
    pub fn reset_key(&self) -> RequestId {
        let operation = Operation::ResetKey;
        let request_id = self.next_request(operation);
        let provider = Arc::clone(&self.provider);
        self.dispatcher.dispatch(
            request_id,
            operation,
            self.completions.clone(),
            move || provider.reset_key(),
            |request_id, ()| Notification::KeyResetComplete { request_id },
        );
        request_id
    }

    /// Outcome: `IntegrityTokenReceived` or `IntegrityTokenError`.
    ///
    /// Pass [`DEFAULT_CLOUD_PROJECT_ID`](crate::provider::DEFAULT_CLOUD_PROJECT_ID)
    /// when no project is known.
    pub fn request_integrity_token(
        &self,
        nonce: impl Into<String>,
        cloud_project_id: i64,
    ) -> RequestId {
        let operation = Operation::RequestIntegrityToken;
        let request_id = self.next_request(operation);
        let provider = Arc::clone(&self.provider);
        let nonce = nonce.into();
        self.dispatcher.dispatch(
            request_id,
            operation,
            self.completions.clone(),
            move || provider.request_integrity_token(&nonce, cloud_project_id),
            |request_id, token| Notification::IntegrityTokenReceived { request_id, token },
        );
        request_id
    }

    /// Resolve a token request whose arguments could not be read as an
    /// `IntegrityTokenError` carrying `error`. The provider is not called.
    pub fn reject_integrity_token(&self, error: ProviderError) -> RequestId {
        let operation = Operation::RequestIntegrityToken;
        let request_id = self.next_request(operation);
        self.dispatcher.dispatch(
            request_id,
            operation,
            self.completions.clone(),
            move || Err(error),
            |request_id, token| Notification::IntegrityTokenReceived { request_id, token },
        );
        request_id
    }
}

impl fmt::Debug for AttestationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestationService")
            .field("provider", &self.provider.kind())
            .field("timeout", &self.dispatcher.timeout())
            .field("next_request_id", &self.next_request_id.load(Ordering::Relaxed))
            .finish()
    }
}

pub struct AttestationServiceBuilder {
    provider: Arc<dyn PlatformProvider>,
    handle: Option<Handle>,
    worker_threads: usize,
    timeout: Option<Duration>,
}

impl AttestationServiceBuilder {
    pub fn new(provider: Arc<dyn PlatformProvider>) -> Self {
        Self {
            provider,
            handle: None,
            worker_threads: DEFAULT_WORKER_THREADS,
            timeout: None,
        }
    }

    /// Dispatch onto an existing runtime instead of starting one.
    pub fn runtime_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Async worker threads of an owned runtime. Ignored with
    /// [`runtime_handle`](Self::runtime_handle).
    pub fn worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> ServiceResult<(AttestationService, CompletionQueue)> {
        let dispatcher = match self.handle {
            Some(handle) => Dispatcher::borrowed(handle, self.timeout),
            None => Dispatcher::owned(self.worker_threads, self.timeout)?,
        };
        let (completions, queue) = completion::channel();

        info!(
            provider = %self.provider.kind(),
            timeout_ms = self.timeout.map(|t| t.as_millis() as u64),
            "Attestation service ready"
        );

        let service = AttestationService {
            provider: self.provider,
            dispatcher,
            completions,
            next_request_id: AtomicU64::new(1),
        };
        Ok((service, queue))
    }
}

//! Outcome delivery on the caller's context.
//!
//! Workers post exactly one [`Notification`] per request into an unbounded
//! channel. The single [`CompletionQueue`] drains it on the thread that owns
//! it, so listeners never run on a worker.

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TryRecvError};

use super::{Operation, RequestId};
use crate::error::Fault;
use crate::result::AttestationResult;

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    AttestationGenerated {
        request_id: RequestId,
        result: AttestationResult,
    },
    HardwareBackedResult {
        request_id: RequestId,
        available: bool,
    },
    KeyResetComplete {
        request_id: RequestId,
    },
    /// Failure of generate, check or reset.
    AttestationError {
        request_id: RequestId,
        operation: Operation,
        fault: Fault,
    },
    IntegrityTokenReceived {
        request_id: RequestId,
        token: String,
    },
    IntegrityTokenError {
        request_id: RequestId,
        fault: Fault,
    },
}

impl Notification {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::AttestationGenerated { request_id, .. }
            | Self::HardwareBackedResult { request_id, .. }
            | Self::KeyResetComplete { request_id }
            | Self::AttestationError { request_id, .. }
            | Self::IntegrityTokenReceived { request_id, .. }
            | Self::IntegrityTokenError { request_id, .. } => *request_id,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::AttestationGenerated { .. } => Operation::GenerateAttestation,
            Self::HardwareBackedResult { .. } => Operation::CheckHardwareBacked,
            Self::KeyResetComplete { .. } => Operation::ResetKey,
            Self::AttestationError { operation, .. } => *operation,
            Self::IntegrityTokenReceived { .. } | Self::IntegrityTokenError { .. } => {
                Operation::RequestIntegrityToken
            }
        }
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Self::AttestationError { fault, .. } | Self::IntegrityTokenError { fault, .. } => {
                Some(fault)
            }
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.fault().is_some()
    }

    pub(crate) fn failure(request_id: RequestId, operation: Operation, fault: Fault) -> Self {
        match operation {
            Operation::RequestIntegrityToken => Self::IntegrityTokenError { request_id, fault },
            _ => Self::AttestationError {
                request_id,
                operation,
                fault,
            },
        }
    }

    /// Invoke the listener method matching this notification.
    pub fn dispatch_to(self, listener: &mut dyn AttestationListener) {
        match self {
            Self::AttestationGenerated { request_id, result } => {
                listener.on_attestation_generated(request_id, result)
            }
            Self::HardwareBackedResult {
                request_id,
                available,
            } => listener.on_hardware_backed_result(request_id, available),
            Self::KeyResetComplete { request_id } => listener.on_key_reset_complete(request_id),
            Self::AttestationError {
                request_id,
                operation,
                fault,
            } => listener.on_attestation_error(request_id, operation, fault),
            Self::IntegrityTokenReceived { request_id, token } => {
                listener.on_integrity_token_received(request_id, token)
            }
            Self::IntegrityTokenError { request_id, fault } => {
                listener.on_integrity_token_error(request_id, fault)
            }
        }
    }
}

/// Receiver of outcome callbacks. Every method defaults to a no-op.
pub trait AttestationListener {
    fn on_attestation_generated(&mut self, _request_id: RequestId, _result: AttestationResult) {}

    fn on_hardware_backed_result(&mut self, _request_id: RequestId, _available: bool) {}

    fn on_key_reset_complete(&mut self, _request_id: RequestId) {}

    fn on_attestation_error(&mut self, _request_id: RequestId, _operation: Operation, _fault: Fault) {}

    fn on_integrity_token_received(&mut self, _request_id: RequestId, _token: String) {}

    fn on_integrity_token_error(&mut self, _request_id: RequestId, _fault: Fault) {}
}

pub(crate) type CompletionSender = mpsc::UnboundedSender<Notification>;

pub(crate) fn channel() -> (CompletionSender, CompletionQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, CompletionQueue { rx })
}

/// Single consumer of request outcomes.
#[derive(Debug)]
pub struct CompletionQueue {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl CompletionQueue {
    /// Next notification if one is ready.
    pub fn try_recv(&mut self) -> Option<Notification> {
        match self.rx.try_recv() {
            Ok(notification) => Some(notification),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for the next notification. `None` once the service is gone and
    /// every pending notification has been taken.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv) for threads outside any
    /// async runtime. Panics if called from within one.
    pub fn blocking_recv(&mut self) -> Option<Notification> {
        self.rx.blocking_recv()
    }

    /// Deliver every ready notification to `listener` and return how many
    /// were delivered. Never waits.
    pub fn drain(&mut self, listener: &mut dyn AttestationListener) -> usize {
        let mut delivered = 0;
        while let Some(notification) = self.try_recv() {
            notification.dispatch_to(listener);
            delivered += 1;
        }
        delivered
    }
}

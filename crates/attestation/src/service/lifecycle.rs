//! Per-request state machine.
//!
//! ```text
//! Idle -> Dispatched -> ProviderInvoked -> Succeeded | Failed -> NotificationDelivered -> Idle
//! ```
//!
//! A request that times out moves to `Failed` without a provider result,
//! from `ProviderInvoked` or, when no worker picked it up in time, straight
//! from `Dispatched`. A late worker never advances the machine again.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use super::{Operation, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPhase {
    Idle,
    Dispatched,
    ProviderInvoked,
    Succeeded,
    Failed,
    NotificationDelivered,
}

impl RequestPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn can_advance_to(&self, next: RequestPhase) -> bool {
        use RequestPhase::*;
        matches!(
            (self, next),
            (Idle, Dispatched)
                | (Dispatched, ProviderInvoked)
                | (Dispatched, Failed)
                | (ProviderInvoked, Succeeded)
                | (ProviderInvoked, Failed)
                | (Succeeded, NotificationDelivered)
                | (Failed, NotificationDelivered)
                | (NotificationDelivered, Idle)
        )
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Dispatched => "dispatched",
            Self::ProviderInvoked => "provider_invoked",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::NotificationDelivered => "notification_delivered",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("request {request_id} ({operation}): illegal transition {from} -> {to}")]
pub struct LifecycleError {
    pub request_id: RequestId,
    pub operation: Operation,
    pub from: RequestPhase,
    pub to: RequestPhase,
}

/// Tracks one request through its phases.
#[derive(Debug, Clone)]
pub struct RequestLifecycle {
    request_id: RequestId,
    operation: Operation,
    phase: RequestPhase,
}

impl RequestLifecycle {
    pub fn new(request_id: RequestId, operation: Operation) -> Self {
        Self {
            request_id,
            operation,
            phase: RequestPhase::Idle,
        }
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Move to `next`. An illegal transition leaves the phase unchanged.
    pub fn advance(&mut self, next: RequestPhase) -> Result<RequestPhase, LifecycleError> {
        if !self.phase.can_advance_to(next) {
            return Err(LifecycleError {
                request_id: self.request_id,
                operation: self.operation,
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(next)
    }

    /// Mark the provider call as started. Returns `false` once the request
    /// has already been resolved without it, in which case the call must be
    /// skipped.
    pub fn begin_invocation(&mut self) -> bool {
        if self.phase != RequestPhase::Dispatched {
            return false;
        }
        self.phase = RequestPhase::ProviderInvoked;
        true
    }

    /// Like [`advance`](Self::advance), but logs an illegal transition
    /// instead of returning it.
    pub fn record(&mut self, next: RequestPhase) {
        if let Err(e) = self.advance(next) {
            error!(
                request_id = %e.request_id,
                operation = %e.operation,
                "Request lifecycle violation: {}",
                e
            );
        }
    }
}

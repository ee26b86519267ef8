//! Process-scoped service registry.
//!
//! Hosts that cannot keep a handle across calls (JNI exports, for one)
//! install the service once and look it up on every entry.

use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::service::AttestationService;

static SERVICE: Lazy<Mutex<Option<Arc<AttestationService>>>> = Lazy::new(|| Mutex::new(None));

fn slot() -> MutexGuard<'static, Option<Arc<AttestationService>>> {
    // A panic while holding the lock cannot leave the slot half-written.
    SERVICE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Install `service` as the process-wide instance.
pub fn install(service: AttestationService) -> ServiceResult<Arc<AttestationService>> {
    let mut slot = slot();
    if slot.is_some() {
        warn!("Attestation service already installed; keeping the existing instance");
        return Err(ServiceError::AlreadyInitialized);
    }
    let service = Arc::new(service);
    *slot = Some(Arc::clone(&service));
    info!(provider = %service.provider_kind(), "Attestation service installed");
    Ok(service)
}

pub fn global() -> ServiceResult<Arc<AttestationService>> {
    slot().clone().ok_or(ServiceError::NotInitialized)
}

pub fn is_installed() -> bool {
    slot().is_some()
}

/// Remove and return the installed service.
pub fn take() -> Option<Arc<AttestationService>> {
    let taken = slot().take();
    if taken.is_some() {
        info!("Attestation service removed from registry");
    }
    taken
}

/// Drop the installed service, if any.
pub fn reset() {
    drop(take());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StubProvider;

    // The registry is process-wide; keep every registry test in this one
    // function so parallel tests cannot interleave.
    #[test]
    fn test_registry_lifecycle() {
        reset();
        assert!(matches!(global(), Err(ServiceError::NotInitialized)));

        let (service, _queue) = AttestationService::new(Arc::new(StubProvider::new())).unwrap();
        install(service).unwrap();
        assert!(is_installed());
        assert!(global().is_ok());

        let (second, _queue) = AttestationService::new(Arc::new(StubProvider::new())).unwrap();
        assert!(matches!(
            install(second),
            Err(ServiceError::AlreadyInitialized)
        ));

        assert!(take().is_some());
        assert!(!is_installed());
        reset();
        assert!(matches!(global(), Err(ServiceError::NotInitialized)));
    }
}

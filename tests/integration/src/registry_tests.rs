//! Process-scoped registry as used by host bridges

use crate::test_utils::{init_test_logging, next_notification};
use attestbridge_attestation::{
    registry, AttestationService, Notification, ServiceError, StubProvider,
};
use std::sync::{Arc, Mutex};

// Registry state is global to the test binary.
static REGISTRY_LOCK: Mutex<()> = Mutex::new(());

#[tokio::test]
async fn test_installed_service_is_reachable_globally() {
    init_test_logging();
    let _guard = REGISTRY_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    registry::reset();

    let (service, mut queue) = AttestationService::new(Arc::new(StubProvider::new())).unwrap();
    registry::install(service).unwrap();

    let request_id = registry::global().unwrap().check_hardware_backed();
    assert_eq!(
        next_notification(&mut queue).await,
        Notification::HardwareBackedResult {
            request_id,
            available: false,
        }
    );

    registry::reset();
    assert!(matches!(
        registry::global(),
        Err(ServiceError::NotInitialized)
    ));
}

#[test]
fn test_second_install_is_rejected_until_reset() {
    init_test_logging();
    let _guard = REGISTRY_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    registry::reset();

    let (first, _first_queue) = AttestationService::new(Arc::new(StubProvider::new())).unwrap();
    let (second, _second_queue) = AttestationService::new(Arc::new(StubProvider::new())).unwrap();
    registry::install(first).unwrap();
    assert!(matches!(
        registry::install(second),
        Err(ServiceError::AlreadyInitialized)
    ));

    registry::reset();
    let (third, _third_queue) = AttestationService::new(Arc::new(StubProvider::new())).unwrap();
    assert!(registry::install(third).is_ok());
    registry::reset();
}

#[test]
fn test_queue_closes_after_reset() {
    init_test_logging();
    let _guard = REGISTRY_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    registry::reset();

    let (service, mut queue) = AttestationService::new(Arc::new(StubProvider::new())).unwrap();
    registry::install(service).unwrap();
    registry::reset();

    assert!(queue.blocking_recv().is_none());
}

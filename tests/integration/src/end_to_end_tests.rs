//! End-to-end tests: configuration -> provider selection -> dispatch -> delivery
//!
//! Tests cover:
//! - TOML configuration selecting the hardware, stub and cloud providers
//! - Structured results decoded from a companion attestation map
//! - Integrity tokens from the bridge and from a cloud endpoint
//! - Host bridge failures surfacing as faults with operation context

use crate::test_utils::{
    init_test_logging, keystore_record, next_notification, start_token_server, CollectingListener,
    RecordingBridge,
};
use attestbridge_android::BridgeError;
use attestbridge_attestation::{
    AttestationService, Config, FaultKind, FieldValue, ForeignBridge, ForeignRecord,
    Notification, ProviderError, ProviderKind,
};
use std::sync::Arc;

fn hardware_config() -> Config {
    Config::from_toml_str(
        r#"
        [provider]
        kind = "hardware"

        [dispatch]
        worker_threads = 1
        timeout_ms = 5000
        "#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_hardware_attestation_from_companion_map() {
    init_test_logging();
    let bridge = Arc::new(RecordingBridge::new(keystore_record("a1b2c3", "n-1")));
    let (service, mut queue) =
        AttestationService::from_config(&hardware_config(), Some(bridge.clone())).unwrap();
    assert_eq!(service.provider_kind(), ProviderKind::Hardware);

    let request_id = service.generate_attestation();
    let result = match next_notification(&mut queue).await {
        Notification::AttestationGenerated {
            request_id: id,
            result,
        } => {
            assert_eq!(id, request_id);
            result
        }
        other => panic!("unexpected notification: {:?}", other),
    };

    let map = result.to_structured_map();
    assert_eq!(map.len(), 8);
    assert_eq!(map["device_id"], FieldValue::Text("a1b2c3".to_string()));
    assert_eq!(map["timestamp"], FieldValue::Integer(1_712_000_000));
    assert_eq!(map["is_hardware_backed"], FieldValue::Bool(true));
    assert_eq!(
        map["attestation_chain"].as_text_list().unwrap(),
        ["leaf-cert", "intermediate-cert", "root-cert"]
    );
    assert_eq!(bridge.calls(), ["generateAttestation"]);
}

#[tokio::test]
async fn test_hardware_integrity_token_is_bridge_value() {
    init_test_logging();
    let bridge = Arc::new(RecordingBridge::new(keystore_record("id", "n")));
    let (service, mut queue) =
        AttestationService::from_config(&hardware_config(), Some(bridge.clone())).unwrap();

    service.request_integrity_token("abc123", 42);
    assert!(matches!(
        next_notification(&mut queue).await,
        Notification::IntegrityTokenReceived { ref token, .. } if token == "bridge-token:abc123:42"
    ));
    assert_eq!(bridge.calls(), ["requestIntegrityToken(abc123, 42)"]);
}

#[tokio::test]
async fn test_unavailable_companion_surfaces_faults() {
    init_test_logging();
    let bridge = Arc::new(RecordingBridge::failing(ProviderError::unavailable(
        "JavaVM not captured",
    )));
    let (service, mut queue) =
        AttestationService::from_config(&hardware_config(), Some(bridge)).unwrap();

    let generate = service.generate_attestation();
    let notification = next_notification(&mut queue).await;
    assert_eq!(notification.request_id(), generate);
    assert_eq!(
        notification.fault().unwrap().kind,
        FaultKind::ProviderUnavailable
    );

    // Availability is reported conservatively instead of failing.
    service.check_hardware_backed();
    assert!(matches!(
        next_notification(&mut queue).await,
        Notification::HardwareBackedResult {
            available: false,
            ..
        }
    ));
}

struct ThrowingBridge;

impl ForeignBridge for ThrowingBridge {
    fn generate_attestation(&self) -> Result<ForeignRecord, ProviderError> {
        Err(BridgeError::marshal(
            "attestation map entry 'timestamp' has type java.lang.String, expected java.lang.Long",
        )
        .into())
    }

    fn is_hardware_backed_available(&self) -> Result<bool, ProviderError> {
        Err(BridgeError::NotInitialized.into())
    }

    fn reset_key(&self) -> Result<(), ProviderError> {
        Err(BridgeError::JavaException {
            method: "resetKey",
            message: "java.security.KeyStoreException: locked".to_string(),
        }
        .into())
    }

    fn request_integrity_token(&self, _nonce: &str, _id: i64) -> Result<String, ProviderError> {
        Err(BridgeError::NotInitialized.into())
    }
}

#[tokio::test]
async fn test_host_bridge_errors_carry_operation_context() {
    init_test_logging();
    let (service, mut queue) =
        AttestationService::from_config(&hardware_config(), Some(Arc::new(ThrowingBridge)))
            .unwrap();

    service.reset_key();
    let fault = next_notification(&mut queue).await.fault().cloned().unwrap();
    assert_eq!(fault.kind, FaultKind::ProviderError);
    assert_eq!(
        fault.message,
        "Failed to reset key: resetKey threw java.security.KeyStoreException: locked"
    );

    service.request_integrity_token("n", 0);
    match next_notification(&mut queue).await {
        Notification::IntegrityTokenError { fault, .. } => {
            assert_eq!(fault.kind, FaultKind::ProviderUnavailable);
        }
        other => panic!("unexpected notification: {:?}", other),
    }

    service.generate_attestation();
    let fault = next_notification(&mut queue).await.fault().cloned().unwrap();
    assert!(fault.message.starts_with("Failed to generate attestation: "));
    assert!(fault.message.contains("'timestamp'"));
}

#[tokio::test]
async fn test_stub_selected_from_config() {
    init_test_logging();
    let config = Config::from_toml_str("[provider]\nkind = \"stub\"\n").unwrap();
    let (service, mut queue) = AttestationService::from_config(&config, None).unwrap();
    assert_eq!(service.provider_kind(), ProviderKind::Stub);

    let generated = service.generate_attestation();
    let token = service.request_integrity_token("abc123", 42);

    let mut listener = CollectingListener::default();
    for _ in 0..2 {
        next_notification(&mut queue)
            .await
            .dispatch_to(&mut listener);
    }
    listener.events.sort();

    let mut expected = vec![
        format!("{} generated desktop-stub-id", generated),
        format!("{} token-error unsupported_operation", token),
    ];
    expected.sort();
    assert_eq!(listener.events, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cloud_tokens_over_hardware_attestation() {
    init_test_logging();
    let endpoint = start_token_server().await;
    let config = Config::from_toml_str(&format!(
        "[provider]\nkind = \"cloud\"\n\n[cloud]\nendpoint = \"{}\"\nrequest_timeout_ms = 3000\n",
        endpoint
    ))
    .unwrap();

    let bridge = Arc::new(RecordingBridge::new(keystore_record("hw-1", "n")));
    let (service, mut queue) = AttestationService::from_config(&config, Some(bridge.clone())).unwrap();
    assert_eq!(service.provider_kind(), ProviderKind::Cloud);

    service.request_integrity_token("abc123", 42);
    assert!(matches!(
        next_notification(&mut queue).await,
        Notification::IntegrityTokenReceived { ref token, .. } if token == "cloud-token:abc123:42"
    ));

    service.generate_attestation();
    match next_notification(&mut queue).await {
        Notification::AttestationGenerated { result, .. } => {
            assert_eq!(result.device_id(), "hw-1");
            assert!(result.is_hardware_backed());
        }
        other => panic!("unexpected notification: {:?}", other),
    }

    // The token came from the endpoint, not the companion.
    assert_eq!(bridge.calls(), ["generateAttestation"]);
}

#[test]
fn test_cloud_without_endpoint_is_rejected() {
    let err = Config::from_toml_str("[provider]\nkind = \"cloud\"\n").unwrap_err();
    assert!(err.to_string().contains("cloud.endpoint"));
}

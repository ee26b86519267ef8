//! Test utilities for cross-crate integration tests

use attestbridge_attestation::provider::foreign::{
    KEY_ATTESTATION_CHAIN, KEY_DEVICE_ID, KEY_IS_HARDWARE_BACKED, KEY_NONCE, KEY_PAYLOAD,
    KEY_PUBLIC_KEY, KEY_SIGNATURE, KEY_TIMESTAMP,
};
use attestbridge_attestation::{
    AttestationListener, AttestationResult, CompletionQueue, Fault, ForeignBridge, ForeignRecord,
    ForeignValue, Notification, Operation, ProviderError, RequestId,
};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Mutex;
use tokio::time::Duration;

/// Install a test-friendly subscriber once per test binary.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Attestation map as a Keystore-backed companion would return it.
pub fn keystore_record(device_id: &str, nonce: &str) -> ForeignRecord {
    ForeignRecord::new()
        .with(KEY_DEVICE_ID, device_id)
        .with(
            KEY_PAYLOAD,
            format!(r#"{{"did":"{}","ts":1712000000,"nonce":"{}"}}"#, device_id, nonce),
        )
        .with(KEY_SIGNATURE, "MEUCIQD1")
        .with(KEY_PUBLIC_KEY, "-----BEGIN PUBLIC KEY-----\nMFkw\n-----END PUBLIC KEY-----")
        .with(
            KEY_ATTESTATION_CHAIN,
            ForeignValue::List(vec![
                "leaf-cert".into(),
                "intermediate-cert".into(),
                "root-cert".into(),
            ]),
        )
        .with(KEY_TIMESTAMP, ForeignValue::Int(1_712_000_000))
        .with(KEY_NONCE, nonce)
        .with(KEY_IS_HARDWARE_BACKED, true)
}

/// Mock companion that records every call it receives.
pub struct RecordingBridge {
    record: Result<ForeignRecord, ProviderError>,
    hardware_backed: Result<bool, ProviderError>,
    calls: Mutex<Vec<String>>,
}

impl RecordingBridge {
    pub fn new(record: ForeignRecord) -> Self {
        Self {
            record: Ok(record),
            hardware_backed: Ok(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            record: Err(error.clone()),
            hardware_backed: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ForeignBridge for RecordingBridge {
    fn generate_attestation(&self) -> Result<ForeignRecord, ProviderError> {
        self.log("generateAttestation".to_string());
        self.record.clone()
    }

    fn is_hardware_backed_available(&self) -> Result<bool, ProviderError> {
        self.log("isHardwareBackedAvailable".to_string());
        self.hardware_backed.clone()
    }

    fn reset_key(&self) -> Result<(), ProviderError> {
        self.log("resetKey".to_string());
        self.hardware_backed.clone().map(|_| ())
    }

    fn request_integrity_token(
        &self,
        nonce: &str,
        cloud_project_id: i64,
    ) -> Result<String, ProviderError> {
        self.log(format!("requestIntegrityToken({}, {})", nonce, cloud_project_id));
        Ok(format!("bridge-token:{}:{}", nonce, cloud_project_id))
    }
}

/// Wait for the next notification, failing the test after five seconds.
pub async fn next_notification(queue: &mut CompletionQueue) -> Notification {
    tokio::time::timeout(Duration::from_secs(5), queue.recv())
        .await
        .expect("notification did not arrive in time")
        .expect("completion channel closed")
}

/// Listener that renders each callback as one line.
#[derive(Default)]
pub struct CollectingListener {
    pub events: Vec<String>,
}

impl AttestationListener for CollectingListener {
    fn on_attestation_generated(&mut self, request_id: RequestId, result: AttestationResult) {
        self.events
            .push(format!("{} generated {}", request_id, result.device_id()));
    }

    fn on_hardware_backed_result(&mut self, request_id: RequestId, available: bool) {
        self.events
            .push(format!("{} hardware {}", request_id, available));
    }

    fn on_key_reset_complete(&mut self, request_id: RequestId) {
        self.events.push(format!("{} reset", request_id));
    }

    fn on_attestation_error(&mut self, request_id: RequestId, operation: Operation, fault: Fault) {
        self.events
            .push(format!("{} error {} {}", request_id, operation, fault.kind));
    }

    fn on_integrity_token_received(&mut self, request_id: RequestId, token: String) {
        self.events.push(format!("{} token {}", request_id, token));
    }

    fn on_integrity_token_error(&mut self, request_id: RequestId, fault: Fault) {
        self.events
            .push(format!("{} token-error {}", request_id, fault.kind));
    }
}

/// Start a local integrity token endpoint and return its URL.
pub async fn start_token_server() -> String {
    async fn issue(Json(body): Json<Value>) -> Json<Value> {
        let nonce = body["nonce"].as_str().unwrap_or_default().to_string();
        let project = body["cloud_project_id"].as_i64().unwrap_or(0);
        Json(json!({ "token": format!("cloud-token:{}:{}", nonce, project) }))
    }

    let app = Router::new().route("/v1/integrity", post(issue));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/v1/integrity", local_addr)
}

//! Software stub for platforms without a secure attestation subsystem.
//!
//! Output is fixed and public. Nothing produced here carries any security
//! guarantee, and integrity tokens are never fabricated.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use super::{PlatformProvider, ProviderKind};
use crate::error::ProviderError;
use crate::result::AttestationResult;

pub const STUB_DEVICE_ID: &str = "desktop-stub-id";
pub const STUB_PAYLOAD: &str = r#"{"did":"desktop-stub-id","ts":0,"nonce":"stub"}"#;
pub const STUB_SIGNATURE: &str = "stub-signature";
pub const STUB_PUBLIC_KEY: &str = "stub-public-key";
pub const STUB_NONCE: &str = "stub-nonce";

#[derive(Debug, Default)]
pub struct StubProvider {
    advisory_emitted: AtomicBool,
}

impl StubProvider {
    pub fn new() -> Self {
        warn!("STATUS: StubProvider :: Hardware Root of Trust :: STUBBED");
        Self {
            advisory_emitted: AtomicBool::new(false),
        }
    }

    fn emit_advisory_once(&self) {
        if !self.advisory_emitted.swap(true, Ordering::SeqCst) {
            warn!(
                "No secure attestation provider on this platform. Returning stub data; \
                 hardware-backed security is only available on Android/iOS."
            );
        }
    }

    /// Whether the one-time advisory has been logged.
    pub fn advisory_emitted(&self) -> bool {
        self.advisory_emitted.load(Ordering::SeqCst)
    }
}

impl PlatformProvider for StubProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stub
    }

    fn generate_attestation(&self) -> Result<AttestationResult, ProviderError> {
        self.emit_advisory_once();

        Ok(AttestationResult::builder()
            .device_id(STUB_DEVICE_ID)
            .payload(STUB_PAYLOAD)
            .signature(STUB_SIGNATURE)
            .public_key(STUB_PUBLIC_KEY)
            .attestation_chain(Vec::<String>::new())
            .timestamp(0)
            .nonce(STUB_NONCE)
            .hardware_backed(false)
            .build())
    }

    fn is_hardware_backed_available(&self) -> bool {
        false
    }

    fn reset_key(&self) -> Result<(), ProviderError> {
        warn!("reset_key() is not supported by the stub provider; nothing to reset");
        Ok(())
    }

    fn request_integrity_token(
        &self,
        _nonce: &str,
        _cloud_project_id: i64,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::Unsupported {
            operation: "request_integrity_token",
            provider: "stub",
        })
    }
}

//! Hardware-backed provider reached through a foreign bridge.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::foreign::ForeignBridge;
use super::{PlatformProvider, ProviderKind};
use crate::error::ProviderError;
use crate::result::AttestationResult;

/// Provider delegating to the platform's secure attestation subsystem.
pub struct HardwareProvider<B: ForeignBridge + ?Sized = dyn ForeignBridge> {
    bridge: Arc<B>,
}

impl<B: ForeignBridge + ?Sized> HardwareProvider<B> {
    pub fn new(bridge: Arc<B>) -> Self {
        info!("STATUS: HardwareProvider :: Foreign Attestation Bridge :: ACTIVE");
        Self { bridge }
    }
}

impl<B: ForeignBridge + ?Sized> PlatformProvider for HardwareProvider<B> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Hardware
    }

    fn generate_attestation(&self) -> Result<AttestationResult, ProviderError> {
        debug!("Generating attestation via foreign bridge");
        let record = self.bridge.generate_attestation()?;
        let result = record.into_attestation_result()?;
        debug!(
            device_id = result.device_id(),
            chain_len = result.attestation_chain().len(),
            hardware_backed = result.is_hardware_backed(),
            "Attestation decoded"
        );
        Ok(result)
    }

    fn is_hardware_backed_available(&self) -> bool {
        match self.bridge.is_hardware_backed_available() {
            Ok(available) => available,
            Err(e) => {
                warn!("Hardware availability check failed, reporting unavailable: {}", e);
                false
            }
        }
    }

    fn reset_key(&self) -> Result<(), ProviderError> {
        self.bridge.reset_key()?;
        info!("Attestation key reset; a new key is generated on next use");
        Ok(())
    }

    fn request_integrity_token(
        &self,
        nonce: &str,
        cloud_project_id: i64,
    ) -> Result<String, ProviderError> {
        debug!(cloud_project_id, "Requesting integrity token via foreign bridge");
        self.bridge.request_integrity_token(nonce, cloud_project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::foreign::{ForeignRecord, KEY_DEVICE_ID, KEY_IS_HARDWARE_BACKED};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct EchoBridge {
        resets: AtomicUsize,
    }

    impl ForeignBridge for EchoBridge {
        fn generate_attestation(&self) -> Result<ForeignRecord, ProviderError> {
            Ok(ForeignRecord::new()
                .with(KEY_DEVICE_ID, "hw-device")
                .with(KEY_IS_HARDWARE_BACKED, true))
        }

        fn is_hardware_backed_available(&self) -> Result<bool, ProviderError> {
            Err(ProviderError::unavailable("companion not registered"))
        }

        fn reset_key(&self) -> Result<(), ProviderError> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn request_integrity_token(
            &self,
            nonce: &str,
            cloud_project_id: i64,
        ) -> Result<String, ProviderError> {
            Ok(format!("token:{}:{}", nonce, cloud_project_id))
        }
    }

    #[test]
    fn test_generate_decodes_bridge_record() {
        let provider = HardwareProvider::new(Arc::new(EchoBridge::default()));
        let result = provider.generate_attestation().unwrap();
        assert_eq!(result.device_id(), "hw-device");
        assert!(result.is_hardware_backed());
        assert_eq!(provider.kind(), ProviderKind::Hardware);
    }

    #[test]
    fn test_availability_failure_is_conservative() {
        let provider = HardwareProvider::new(Arc::new(EchoBridge::default()));
        assert!(!provider.is_hardware_backed_available());
    }

    #[test]
    fn test_integrity_token_is_passed_through() {
        let provider = HardwareProvider::new(Arc::new(EchoBridge::default()));
        assert_eq!(
            provider.request_integrity_token("abc123", 42).unwrap(),
            "token:abc123:42"
        );
    }

    #[test]
    fn test_reset_reaches_bridge() {
        let bridge = Arc::new(EchoBridge::default());
        let provider = HardwareProvider::new(Arc::clone(&bridge));
        provider.reset_key().unwrap();
        provider.reset_key().unwrap();
        assert_eq!(bridge.resets.load(Ordering::SeqCst), 2);
    }
}

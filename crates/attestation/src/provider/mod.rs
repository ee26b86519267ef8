//! Platform providers.
//!
//! A provider performs the actual attestation and integrity work for one
//! platform. Exactly one provider is active per service:
//! - [`HardwareProvider`]: secure hardware reached through a [`ForeignBridge`]
//! - [`StubProvider`]: deterministic placeholder for platforms without one
//! - [`CloudIntegrityProvider`]: integrity tokens from a cloud endpoint,
//!   everything else delegated to an inner provider

pub mod foreign;
pub mod hardware;
pub mod stub;

#[cfg(feature = "cloud")]
pub mod cloud;

use std::fmt;
use std::sync::Arc;

use attestbridge_core::{Config, ProviderSelection};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ProviderError, ServiceError};
use crate::result::AttestationResult;

#[cfg(feature = "cloud")]
pub use cloud::CloudIntegrityProvider;
pub use foreign::{ForeignBridge, ForeignRecord, ForeignValue};
pub use hardware::HardwareProvider;
pub use stub::StubProvider;

/// Project id used when the caller does not supply one.
pub const DEFAULT_CLOUD_PROJECT_ID: i64 = 0;

/// Provider variant, reported for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Hardware,
    Stub,
    Cloud,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Stub => "stub",
            Self::Cloud => "cloud",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attestation capability of one platform.
///
/// Every method blocks the calling thread for the full platform round trip.
/// [`AttestationService`](crate::AttestationService) only ever calls them from
/// a worker context.
pub trait PlatformProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn generate_attestation(&self) -> Result<AttestationResult, ProviderError>;

    /// Never fails; `false` when availability cannot be determined.
    fn is_hardware_backed_available(&self) -> bool;

    fn reset_key(&self) -> Result<(), ProviderError>;

    fn request_integrity_token(
        &self,
        nonce: &str,
        cloud_project_id: i64,
    ) -> Result<String, ProviderError>;
}

/// Resolve `Auto` against the compilation target.
pub fn resolve_selection(selection: ProviderSelection) -> ProviderSelection {
    match selection {
        ProviderSelection::Auto if cfg!(target_os = "android") => ProviderSelection::Hardware,
        ProviderSelection::Auto => ProviderSelection::Stub,
        other => other,
    }
}

/// Build the provider named by `config`.
///
/// `foreign` is the platform's bridge to its secure subsystem, if the host
/// registered one. A hardware selection without a bridge is an error; a cloud
/// selection wraps the hardware provider when a bridge exists and the stub
/// otherwise.
pub fn from_config(
    config: &Config,
    foreign: Option<Arc<dyn ForeignBridge>>,
) -> Result<Arc<dyn PlatformProvider>, ServiceError> {
    let selection = resolve_selection(config.provider.kind);
    info!(
        requested = %config.provider.kind,
        resolved = %selection,
        "Selecting attestation provider"
    );

    match selection {
        ProviderSelection::Hardware => {
            let bridge = foreign.ok_or_else(|| {
                ServiceError::ProviderSelection(
                    "hardware provider requested but no foreign bridge is registered".to_string(),
                )
            })?;
            Ok(Arc::new(HardwareProvider::new(bridge)))
        }
        ProviderSelection::Stub | ProviderSelection::Auto => Ok(Arc::new(StubProvider::new())),
        ProviderSelection::Cloud => cloud_from_config(config, foreign),
    }
}

#[cfg(feature = "cloud")]
fn cloud_from_config(
    config: &Config,
    foreign: Option<Arc<dyn ForeignBridge>>,
) -> Result<Arc<dyn PlatformProvider>, ServiceError> {
    let inner: Arc<dyn PlatformProvider> = match foreign {
        Some(bridge) => Arc::new(HardwareProvider::new(bridge)),
        None => {
            warn!("Cloud provider has no foreign bridge; attestation falls back to the stub");
            Arc::new(StubProvider::new())
        }
    };
    let provider = CloudIntegrityProvider::from_config(&config.cloud, inner)
        .map_err(|e| ServiceError::ProviderSelection(e.to_string()))?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "cloud"))]
fn cloud_from_config(
    _config: &Config,
    _foreign: Option<Arc<dyn ForeignBridge>>,
) -> Result<Arc<dyn PlatformProvider>, ServiceError> {
    warn!("Cloud provider requested but this build has the 'cloud' feature disabled");
    Err(ServiceError::ProviderSelection(
        "cloud provider support is not compiled in".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolves_to_stub_off_android() {
        if cfg!(target_os = "android") {
            return;
        }
        assert_eq!(
            resolve_selection(ProviderSelection::Auto),
            ProviderSelection::Stub
        );
        assert_eq!(
            resolve_selection(ProviderSelection::Cloud),
            ProviderSelection::Cloud
        );
    }

    #[test]
    fn test_hardware_without_bridge_is_rejected() {
        let mut config = Config::default();
        config.provider.kind = ProviderSelection::Hardware;
        let err = from_config(&config, None).err().unwrap();
        assert!(matches!(err, ServiceError::ProviderSelection(_)));
    }

    #[test]
    fn test_stub_selection() {
        let mut config = Config::default();
        config.provider.kind = ProviderSelection::Stub;
        let provider = from_config(&config, None).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Stub);
        assert!(!provider.is_hardware_backed_available());
    }
}

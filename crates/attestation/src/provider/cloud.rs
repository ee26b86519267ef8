//! Integrity tokens from a cloud token endpoint.
//!
//! Attestation, availability and key reset are delegated to an inner
//! provider; only `request_integrity_token` goes over the network.

use std::sync::Arc;
use std::time::Duration;

use attestbridge_core::CloudConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{PlatformProvider, ProviderKind};
use crate::error::ProviderError;
use crate::result::AttestationResult;

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    nonce: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cloud_project_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

pub struct CloudIntegrityProvider {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
    inner: Arc<dyn PlatformProvider>,
}

impl CloudIntegrityProvider {
    pub fn new(
        endpoint: impl Into<String>,
        request_timeout: Duration,
        inner: Arc<dyn PlatformProvider>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::unavailable(format!("HTTP client setup failed: {}", e)))?;
        let endpoint = endpoint.into();
        info!(endpoint = %endpoint, inner = %inner.kind(), "Cloud integrity provider configured");

        Ok(Self {
            endpoint,
            api_key: None,
            client,
            inner,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn from_config(
        config: &CloudConfig,
        inner: Arc<dyn PlatformProvider>,
    ) -> Result<Self, ProviderError> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| ProviderError::unavailable("cloud.endpoint is not configured"))?;
        let provider = Self::new(
            endpoint,
            Duration::from_millis(config.request_timeout_ms),
            inner,
        )?;
        Ok(match &config.api_key {
            Some(key) => provider.with_api_key(key.clone()),
            None => provider,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_token(&self, nonce: &str, cloud_project_id: i64) -> Result<String, ProviderError> {
        let body = TokenRequest {
            nonce,
            cloud_project_id: (cloud_project_id > 0).then_some(cloud_project_id),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ProviderError::unavailable(format!("integrity endpoint unreachable: {}", e))
            } else if e.is_timeout() {
                ProviderError::failed(format!("integrity endpoint timed out: {}", e))
            } else {
                ProviderError::failed(format!("integrity request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Integrity endpoint rejected request");
            return Err(ProviderError::failed(format!(
                "integrity endpoint returned {}: {}",
                status,
                detail.trim()
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::failed(format!("malformed integrity response: {}", e)))?;

        match parsed.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ProviderError::failed(
                "integrity response did not contain a token",
            )),
        }
    }
}

impl PlatformProvider for CloudIntegrityProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    fn generate_attestation(&self) -> Result<AttestationResult, ProviderError> {
        self.inner.generate_attestation()
    }

    fn is_hardware_backed_available(&self) -> bool {
        self.inner.is_hardware_backed_available()
    }

    fn reset_key(&self) -> Result<(), ProviderError> {
        self.inner.reset_key()
    }

    /// Blocks on the request. Must run on a blocking worker, never on an
    /// async executor thread.
    fn request_integrity_token(
        &self,
        nonce: &str,
        cloud_project_id: i64,
    ) -> Result<String, ProviderError> {
        if nonce.is_empty() {
            return Err(ProviderError::failed("integrity token nonce must not be empty"));
        }
        debug!(cloud_project_id, "Requesting integrity token from cloud endpoint");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle.block_on(self.fetch_token(nonce, cloud_project_id)),
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| {
                        ProviderError::unavailable(format!("failed to start I/O runtime: {}", e))
                    })?;
                runtime.block_on(self.fetch_token(nonce, cloud_project_id))
            }
        }
    }
}

//! Normalized attestation outcome.
//!
//! Every provider, whatever its native response shape, produces an
//! [`AttestationResult`]. The record is built once through
//! [`AttestationResultBuilder`] and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FIELD_DEVICE_ID: &str = "device_id";
pub const FIELD_PAYLOAD: &str = "payload";
pub const FIELD_SIGNATURE: &str = "signature";
pub const FIELD_PUBLIC_KEY: &str = "public_key";
pub const FIELD_ATTESTATION_CHAIN: &str = "attestation_chain";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_NONCE: &str = "nonce";
pub const FIELD_IS_HARDWARE_BACKED: &str = "is_hardware_backed";

/// The eight exported keys, in declaration order.
pub const FIELD_NAMES: [&str; 8] = [
    FIELD_DEVICE_ID,
    FIELD_PAYLOAD,
    FIELD_SIGNATURE,
    FIELD_PUBLIC_KEY,
    FIELD_ATTESTATION_CHAIN,
    FIELD_TIMESTAMP,
    FIELD_NONCE,
    FIELD_IS_HARDWARE_BACKED,
];

/// Snapshot of one attestation outcome.
///
/// Payload, signature and key material are opaque: nothing here verifies them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationResult {
    device_id: String,
    payload: String,
    signature: String,
    public_key: String,
    attestation_chain: Vec<String>,
    /// Provider-defined epoch unit; not comparable across providers.
    timestamp: i64,
    nonce: String,
    is_hardware_backed: bool,
}

/// Typed value in the structured export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    TextList(Vec<String>),
    Integer(i64),
    Bool(bool),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl AttestationResult {
    pub fn builder() -> AttestationResultBuilder {
        AttestationResultBuilder::default()
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn attestation_chain(&self) -> &[String] {
        &self.attestation_chain
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn is_hardware_backed(&self) -> bool {
        self.is_hardware_backed
    }

    /// Export as a key→value mapping containing exactly the eight documented keys.
    pub fn to_structured_map(&self) -> BTreeMap<&'static str, FieldValue> {
        let mut map = BTreeMap::new();
        map.insert(FIELD_DEVICE_ID, FieldValue::Text(self.device_id.clone()));
        map.insert(FIELD_PAYLOAD, FieldValue::Text(self.payload.clone()));
        map.insert(FIELD_SIGNATURE, FieldValue::Text(self.signature.clone()));
        map.insert(FIELD_PUBLIC_KEY, FieldValue::Text(self.public_key.clone()));
        map.insert(
            FIELD_ATTESTATION_CHAIN,
            FieldValue::TextList(self.attestation_chain.clone()),
        );
        map.insert(FIELD_TIMESTAMP, FieldValue::Integer(self.timestamp));
        map.insert(FIELD_NONCE, FieldValue::Text(self.nonce.clone()));
        map.insert(
            FIELD_IS_HARDWARE_BACKED,
            FieldValue::Bool(self.is_hardware_backed),
        );
        map
    }
}

/// One-shot builder; unset fields keep their documented defaults.
#[derive(Debug, Clone, Default)]
pub struct AttestationResultBuilder {
    inner: AttestationResult,
}

impl AttestationResultBuilder {
    pub fn device_id(mut self, value: impl Into<String>) -> Self {
        self.inner.device_id = value.into();
        self
    }

    pub fn payload(mut self, value: impl Into<String>) -> Self {
        self.inner.payload = value.into();
        self
    }

    pub fn signature(mut self, value: impl Into<String>) -> Self {
        self.inner.signature = value.into();
        self
    }

    pub fn public_key(mut self, value: impl Into<String>) -> Self {
        self.inner.public_key = value.into();
        self
    }

    pub fn attestation_chain<I, S>(mut self, chain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.attestation_chain = chain.into_iter().map(Into::into).collect();
        self
    }

    pub fn timestamp(mut self, value: i64) -> Self {
        self.inner.timestamp = value;
        self
    }

    pub fn nonce(mut self, value: impl Into<String>) -> Self {
        self.inner.nonce = value.into();
        self
    }

    pub fn hardware_backed(mut self, value: bool) -> Self {
        self.inner.is_hardware_backed = value;
        self
    }

    pub fn build(self) -> AttestationResult {
        self.inner
    }
}

//! Foreign companion contract and response decoding.
//!
//! The companion object living in the platform runtime answers
//! `generateAttestation` with a string-keyed map. A [`ForeignBridge`]
//! implementation copies that map out of the foreign heap into a
//! [`ForeignRecord`] using checked conversions; decoding the record into an
//! [`AttestationResult`] happens here, on plain Rust values.

use std::collections::HashMap;

use crate::error::ProviderError;
use crate::result::AttestationResult;

pub const KEY_DEVICE_ID: &str = "deviceId";
pub const KEY_PAYLOAD: &str = "payload";
pub const KEY_SIGNATURE: &str = "signature";
pub const KEY_PUBLIC_KEY: &str = "publicKey";
pub const KEY_ATTESTATION_CHAIN: &str = "attestationChain";
pub const KEY_TIMESTAMP: &str = "timestamp";
pub const KEY_NONCE: &str = "nonce";
pub const KEY_IS_HARDWARE_BACKED: &str = "isHardwareBacked";

/// Value copied out of the foreign runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForeignValue {
    Null,
    Str(String),
    Long(i64),
    Int(i32),
    Bool(bool),
    List(Vec<ForeignValue>),
    /// A value of a type the bridge does not marshal, with its runtime class name.
    Other(String),
}

impl ForeignValue {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Str(_) => "java.lang.String",
            Self::Long(_) => "java.lang.Long",
            Self::Int(_) => "java.lang.Integer",
            Self::Bool(_) => "java.lang.Boolean",
            Self::List(_) => "java.util.List",
            Self::Other(class) => class,
        }
    }
}

impl From<&str> for ForeignValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ForeignValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for ForeignValue {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<bool> for ForeignValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// String-keyed response of the companion's attestation generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignRecord {
    entries: HashMap<String, ForeignValue>,
}

impl ForeignRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ForeignValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ForeignValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ForeignValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn string(&self, key: &str) -> Result<Option<String>, ProviderError> {
        match self.get(key) {
            None | Some(ForeignValue::Null) => Ok(None),
            Some(ForeignValue::Str(value)) => Ok(Some(value.clone())),
            Some(other) => Err(type_mismatch(key, "java.lang.String", other)),
        }
    }

    fn integer(&self, key: &str) -> Result<Option<i64>, ProviderError> {
        match self.get(key) {
            None | Some(ForeignValue::Null) => Ok(None),
            Some(ForeignValue::Long(value)) => Ok(Some(*value)),
            Some(ForeignValue::Int(value)) => Ok(Some(i64::from(*value))),
            Some(other) => Err(type_mismatch(key, "java.lang.Long", other)),
        }
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>, ProviderError> {
        match self.get(key) {
            None | Some(ForeignValue::Null) => Ok(None),
            Some(ForeignValue::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(type_mismatch(key, "java.lang.Boolean", other)),
        }
    }

    /// Null list elements are skipped; any other non-string element is an error.
    fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, ProviderError> {
        match self.get(key) {
            None | Some(ForeignValue::Null) => Ok(None),
            Some(ForeignValue::List(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    match item {
                        ForeignValue::Null => continue,
                        ForeignValue::Str(value) => out.push(value.clone()),
                        other => {
                            return Err(ProviderError::failed(format!(
                                "attestation map entry '{}[{}]' has type {}, expected java.lang.String",
                                key,
                                index,
                                other.type_name()
                            )))
                        }
                    }
                }
                Ok(Some(out))
            }
            Some(other) => Err(type_mismatch(key, "java.util.List", other)),
        }
    }

    /// Decode into the normalized result.
    ///
    /// `deviceId` must be present and non-empty. Other absent or null entries
    /// take the result defaults; entries of the wrong type are rejected.
    pub fn into_attestation_result(self) -> Result<AttestationResult, ProviderError> {
        let device_id = self
            .string(KEY_DEVICE_ID)?
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ProviderError::failed(format!(
                    "attestation map is missing a non-empty '{}'",
                    KEY_DEVICE_ID
                ))
            })?;

        Ok(AttestationResult::builder()
            .device_id(device_id)
            .payload(self.string(KEY_PAYLOAD)?.unwrap_or_default())
            .signature(self.string(KEY_SIGNATURE)?.unwrap_or_default())
            .public_key(self.string(KEY_PUBLIC_KEY)?.unwrap_or_default())
            .attestation_chain(self.string_list(KEY_ATTESTATION_CHAIN)?.unwrap_or_default())
            .timestamp(self.integer(KEY_TIMESTAMP)?.unwrap_or_default())
            .nonce(self.string(KEY_NONCE)?.unwrap_or_default())
            .hardware_backed(self.boolean(KEY_IS_HARDWARE_BACKED)?.unwrap_or_default())
            .build())
    }
}

fn type_mismatch(key: &str, expected: &str, actual: &ForeignValue) -> ProviderError {
    ProviderError::failed(format!(
        "attestation map entry '{}' has type {}, expected {}",
        key,
        actual.type_name(),
        expected
    ))
}

/// The four operations of the foreign companion object.
///
/// Implementations own the whole foreign round trip: attaching the calling
/// thread, resolving the companion handle, checked marshaling, exception
/// propagation and releasing every transient reference before returning.
pub trait ForeignBridge: Send + Sync {
    fn generate_attestation(&self) -> Result<ForeignRecord, ProviderError>;

    fn is_hardware_backed_available(&self) -> Result<bool, ProviderError>;

    fn reset_key(&self) -> Result<(), ProviderError>;

    fn request_integrity_token(
        &self,
        nonce: &str,
        cloud_project_id: i64,
    ) -> Result<String, ProviderError>;
}

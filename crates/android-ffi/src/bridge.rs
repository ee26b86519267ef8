//! [`ForeignBridge`] over JNI.

use std::sync::Arc;

use attestbridge_attestation::{ForeignBridge, ForeignRecord, ProviderError};
use jni::objects::{JObject, JString, JValue, JValueOwned};
use jni::JNIEnv;
use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::jvm::JvmContext;
use crate::marshal;

const GENERATE_ATTESTATION: (&str, &str) = ("generateAttestation", "()Ljava/util/Map;");
const IS_HARDWARE_BACKED_AVAILABLE: (&str, &str) = ("isHardwareBackedAvailable", "()Z");
const RESET_KEY: (&str, &str) = ("resetKey", "()V");
const REQUEST_INTEGRITY_TOKEN: (&str, &str) = (
    "requestIntegrityToken",
    "(Ljava/lang/String;J)Ljava/lang/String;",
);

/// Call an instance method, turning a pending Java exception into an error.
///
/// The exception is described to logcat and cleared so the thread can keep
/// using JNI.
pub(crate) fn call_method<'local>(
    env: &mut JNIEnv<'local>,
    obj: &JObject<'_>,
    (name, sig): (&'static str, &'static str),
    args: &[JValue<'_, '_>],
) -> Result<JValueOwned<'local>, BridgeError> {
    match env.call_method(obj, name, sig, args) {
        Ok(value) => Ok(value),
        Err(jni::errors::Error::JavaException) => Err(take_exception(env, name)),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn take_exception(env: &mut JNIEnv<'_>, method: &'static str) -> BridgeError {
    let throwable = match env.exception_occurred() {
        Ok(throwable) => throwable,
        Err(e) => return e.into(),
    };
    let _ = env.exception_describe();
    let _ = env.exception_clear();

    let message = match env
        .call_method(&throwable, "toString", "()Ljava/lang/String;", &[])
        .and_then(|value| value.l())
    {
        Ok(text) => marshal::string_from(env, text).ok(),
        Err(_) => {
            let _ = env.exception_clear();
            None
        }
    };

    BridgeError::JavaException {
        method,
        message: message.unwrap_or_else(|| "an exception".to_string()),
    }
}

/// Reaches the companion object from any worker thread.
pub struct JniBridge {
    context: Arc<JvmContext>,
}

impl JniBridge {
    pub fn new(context: Arc<JvmContext>) -> Self {
        Self { context }
    }
}

impl ForeignBridge for JniBridge {
    fn generate_attestation(&self) -> Result<ForeignRecord, ProviderError> {
        let record = self.context.with_env(|env, companion| {
            let map = call_method(env, companion, GENERATE_ATTESTATION, &[])?.l()?;
            marshal::record_from_map(env, &map)
        })?;
        debug!(entries = record.len(), "Copied attestation map from companion");
        Ok(record)
    }

    fn is_hardware_backed_available(&self) -> Result<bool, ProviderError> {
        let available = self.context.with_env(|env, companion| {
            Ok(call_method(env, companion, IS_HARDWARE_BACKED_AVAILABLE, &[])?.z()?)
        })?;
        Ok(available)
    }

    fn reset_key(&self) -> Result<(), ProviderError> {
        self.context.with_env(|env, companion| {
            call_method(env, companion, RESET_KEY, &[])?.v()?;
            Ok(())
        })?;
        Ok(())
    }

    fn request_integrity_token(
        &self,
        nonce: &str,
        cloud_project_id: i64,
    ) -> Result<String, ProviderError> {
        let token = self.context.with_env(|env, companion| {
            let jnonce: JString = env.new_string(nonce)?;
            let token = call_method(
                env,
                companion,
                REQUEST_INTEGRITY_TOKEN,
                &[JValue::Object(&jnonce), JValue::Long(cloud_project_id)],
            )?
            .l()?;
            if token.is_null() {
                return Err(BridgeError::marshal("requestIntegrityToken returned null"));
            }
            marshal::string_from(env, token)
        })?;

        if token.is_empty() {
            warn!("Companion returned an empty integrity token");
        }
        Ok(token)
    }
}

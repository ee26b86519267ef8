//! Companion callbacks for drained notifications.

use attestbridge_attestation::{
    AttestationListener, AttestationResult, Fault, Operation, RequestId,
};
use jni::objects::{JObject, JValue};
use jni::sys::jlong;
use jni::JNIEnv;
use tracing::error;

use crate::bridge::call_method;
use crate::error::BridgeError;
use crate::marshal;

const CALLBACK_FRAME_CAPACITY: i32 = 16;

const ON_ATTESTATION_GENERATED: (&str, &str) =
    ("onAttestationGenerated", "(JLjava/util/Map;)V");
const ON_HARDWARE_BACKED_RESULT: (&str, &str) = ("onHardwareBackedResult", "(JZ)V");
const ON_KEY_RESET_COMPLETE: (&str, &str) = ("onKeyResetComplete", "(J)V");
const ON_ATTESTATION_ERROR: (&str, &str) = ("onAttestationError", "(JLjava/lang/String;)V");
const ON_INTEGRITY_TOKEN_RECEIVED: (&str, &str) =
    ("onIntegrityTokenReceived", "(JLjava/lang/String;)V");
const ON_INTEGRITY_TOKEN_ERROR: (&str, &str) =
    ("onIntegrityTokenError", "(JLjava/lang/String;)V");

/// Request ids cross JNI as `long`.
pub fn request_id_to_jlong(request_id: RequestId) -> jlong {
    jlong::try_from(request_id.as_u64()).unwrap_or(jlong::MAX)
}

/// Forwards each notification to the companion on the draining thread.
///
/// A failing callback is logged and does not stop the drain.
pub struct CompanionCallbacks<'a, 'local> {
    env: &'a mut JNIEnv<'local>,
    companion: &'a JObject<'a>,
    failures: usize,
}

impl<'a, 'local> CompanionCallbacks<'a, 'local> {
    pub fn new(env: &'a mut JNIEnv<'local>, companion: &'a JObject<'a>) -> Self {
        Self {
            env,
            companion,
            failures: 0,
        }
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    fn invoke<F>(&mut self, callback: (&'static str, &'static str), request_id: RequestId, f: F)
    where
        F: for<'f> FnOnce(
            &mut JNIEnv<'f>,
            &JObject<'_>,
            (&'static str, &'static str),
            jlong,
        ) -> Result<(), BridgeError>,
    {
        let companion = self.companion;
        let id = request_id_to_jlong(request_id);
        let result = self
            .env
            .with_local_frame(CALLBACK_FRAME_CAPACITY, |env| f(env, companion, callback, id));
        if let Err(e) = result {
            self.failures += 1;
            error!(request_id = %request_id, callback = callback.0, "Companion callback failed: {}", e);
        }
    }

    fn message(&mut self, callback: (&'static str, &'static str), request_id: RequestId, text: String) {
        self.invoke(callback, request_id, move |env, companion, callback, id| {
            let jtext = env.new_string(&text)?;
            call_method(
                env,
                companion,
                callback,
                &[JValue::Long(id), JValue::Object(&jtext)],
            )?
            .v()?;
            Ok(())
        });
    }
}

impl AttestationListener for CompanionCallbacks<'_, '_> {
    fn on_attestation_generated(&mut self, request_id: RequestId, result: AttestationResult) {
        let fields = result.to_structured_map();
        self.invoke(
            ON_ATTESTATION_GENERATED,
            request_id,
            move |env, companion, callback, id| {
                let map = marshal::map_from_fields(env, &fields)?;
                call_method(
                    env,
                    companion,
                    callback,
                    &[JValue::Long(id), JValue::Object(&map)],
                )?
                .v()?;
                Ok(())
            },
        );
    }

    fn on_hardware_backed_result(&mut self, request_id: RequestId, available: bool) {
        self.invoke(
            ON_HARDWARE_BACKED_RESULT,
            request_id,
            move |env, companion, callback, id| {
                call_method(
                    env,
                    companion,
                    callback,
                    &[JValue::Long(id), JValue::Bool(u8::from(available))],
                )?
                .v()?;
                Ok(())
            },
        );
    }

    fn on_key_reset_complete(&mut self, request_id: RequestId) {
        self.invoke(
            ON_KEY_RESET_COMPLETE,
            request_id,
            |env, companion, callback, id| {
                call_method(env, companion, callback, &[JValue::Long(id)])?.v()?;
                Ok(())
            },
        );
    }

    fn on_attestation_error(&mut self, request_id: RequestId, _operation: Operation, fault: Fault) {
        self.message(ON_ATTESTATION_ERROR, request_id, fault.message);
    }

    fn on_integrity_token_received(&mut self, request_id: RequestId, token: String) {
        self.message(ON_INTEGRITY_TOKEN_RECEIVED, request_id, token);
    }

    fn on_integrity_token_error(&mut self, request_id: RequestId, fault: Fault) {
        self.message(ON_INTEGRITY_TOKEN_ERROR, request_id, fault.message);
    }
}

//! JNI host bridge for Android.
//!
//! The Kotlin/Java companion `dev.attestbridge.AttestationCompanion`
//! implements the attestation contract on top of Android Keystore and Play
//! Integrity, calls `nativeInitialize` once, dispatches requests through the
//! `native*` entry points, and pumps `nativeDrainCompletions` on its main
//! thread to receive outcome callbacks.

pub mod bridge;
pub mod callbacks;
pub mod error;
pub mod jvm;
pub mod marshal;


use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use attestbridge_attestation::{
    registry, AttestationService, CompletionQueue, ForeignBridge, Notification, ProviderError,
    RequestId,
};
use attestbridge_core::{logging, Config};
use jni::objects::{JObject, JString};
use jni::sys::{jboolean, jint, jlong, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use once_cell::sync::Lazy;
use tracing::{error, info, warn};

pub use bridge::JniBridge;
pub use callbacks::CompanionCallbacks;
pub use error::BridgeError;
pub use jvm::JvmContext;

/// Returned by dispatch entry points when no service is installed.
pub const NOT_INITIALIZED: jlong = -1;

static BRIDGE_STATE: Lazy<Mutex<BridgeState>> = Lazy::new(|| Mutex::new(BridgeState::default()));

#[derive(Default)]
struct BridgeState {
    completions: Option<CompletionQueue>,
}

impl BridgeState {
    fn initialized(&self) -> bool {
        self.completions.is_some()
    }

    /// Everything currently waiting in the queue.
    fn take_pending(&mut self) -> Vec<Notification> {
        let mut pending = Vec::new();
        if let Some(queue) = self.completions.as_mut() {
            while let Some(notification) = queue.try_recv() {
                pending.push(notification);
            }
        }
        pending
    }
}

fn bridge_state() -> Option<MutexGuard<'static, BridgeState>> {
    match BRIDGE_STATE.lock() {
        Ok(state) => Some(state),
        Err(e) => {
            error!("Failed to acquire bridge state lock: {}", e);
            None
        }
    }
}

fn load_config() -> Result<Config, BridgeError> {
    let config = Config::default().with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn dispatch(operation: &str, f: impl FnOnce(&AttestationService) -> RequestId) -> jlong {
    match registry::global() {
        Ok(service) => callbacks::request_id_to_jlong(f(service.as_ref())),
        Err(e) => {
            error!(operation, "Cannot dispatch request: {}", e);
            NOT_INITIALIZED
        }
    }
}

fn initialize(env: &mut JNIEnv<'_>, companion: &JObject<'_>) -> Result<(), BridgeError> {
    let config = load_config()?;
    if let Err(e) = logging::try_init_with(&config.logging) {
        warn!("Logging initialization failed: {}", e);
    }

    let Some(mut state) = bridge_state() else {
        return Err(BridgeError::NotInitialized);
    };
    if state.initialized() {
        warn!("Attestation bridge already initialized");
        return Ok(());
    }

    let companion_class = config.foreign.companion_class.as_str();
    if !env.is_instance_of(companion, companion_class)? {
        return Err(BridgeError::marshal(format!(
            "companion object is not an instance of {}",
            companion_class
        )));
    }

    let vm = env.get_java_vm()?;
    let companion = env.new_global_ref(companion)?;
    let context = Arc::new(JvmContext::new(vm, companion));
    let bridge: Arc<dyn ForeignBridge> = Arc::new(JniBridge::new(context));

    let (service, completions) = AttestationService::from_config(&config, Some(bridge))?;
    let provider = service.provider_kind();
    registry::install(service)?;

    state.completions = Some(completions);
    info!(
        provider = %provider,
        companion = companion_class,
        "STATUS: AttestationBridge :: JNI Companion :: ACTIVE"
    );
    Ok(())
}

#[no_mangle]
pub extern "system" fn Java_dev_attestbridge_AttestationCompanion_nativeInitialize(
    mut env: JNIEnv,
    this: JObject,
) -> jboolean {
    match initialize(&mut env, &this) {
        Ok(()) => JNI_TRUE,
        Err(e) => {
            error!("Failed to initialize attestation bridge: {}", e);
            JNI_FALSE
        }
    }
}

#[no_mangle]
pub extern "system" fn Java_dev_attestbridge_AttestationCompanion_nativeGenerateAttestation(
    _env: JNIEnv,
    _this: JObject,
) -> jlong {
    dispatch("generate_attestation", AttestationService::generate_attestation)
}

#[no_mangle]
pub extern "system" fn Java_dev_attestbridge_AttestationCompanion_nativeCheckHardwareBacked(
    _env: JNIEnv,
    _this: JObject,
) -> jlong {
    dispatch("check_hardware_backed", AttestationService::check_hardware_backed)
}

#[no_mangle]
pub extern "system" fn Java_dev_attestbridge_AttestationCompanion_nativeResetKey(
    _env: JNIEnv,
    _this: JObject,
) -> jlong {
    dispatch("reset_key", AttestationService::reset_key)
}

#[no_mangle]
pub extern "system" fn Java_dev_attestbridge_AttestationCompanion_nativeRequestIntegrityToken(
    mut env: JNIEnv,
    _this: JObject,
    nonce: JString,
    cloud_project_id: jlong,
) -> jlong {
    let nonce = env.get_string(&nonce).map(String::from);
    request_integrity_token(nonce, cloud_project_id)
}

/// An unreadable nonce still yields a request whose outcome is an
/// `IntegrityTokenError`.
fn request_integrity_token<E: fmt::Display>(
    nonce: Result<String, E>,
    cloud_project_id: jlong,
) -> jlong {
    dispatch("request_integrity_token", move |service| match nonce {
        Ok(nonce) => service.request_integrity_token(nonce, cloud_project_id),
        Err(e) => {
            warn!("Failed to convert nonce from JString: {}", e);
            service.reject_integrity_token(ProviderError::failed(format!(
                "nonce could not be read: {}",
                e
            )))
        }
    })
}

#[no_mangle]
pub extern "system" fn Java_dev_attestbridge_AttestationCompanion_nativeDrainCompletions(
    mut env: JNIEnv,
    this: JObject,
) -> jint {
    // Released before any callback runs, so callbacks may dispatch again.
    let pending = match bridge_state() {
        Some(mut state) => state.take_pending(),
        None => return 0,
    };

    let mut callbacks = CompanionCallbacks::new(&mut env, &this);
    let mut delivered: jint = 0;
    for notification in pending {
        notification.dispatch_to(&mut callbacks);
        delivered = delivered.saturating_add(1);
    }
    if callbacks.failures() > 0 {
        warn!(failures = callbacks.failures(), "Some companion callbacks failed");
    }
    delivered
}

#[no_mangle]
pub extern "system" fn Java_dev_attestbridge_AttestationCompanion_nativeShutdown(
    _env: JNIEnv,
    _this: JObject,
) {
    registry::reset();
    if let Some(mut state) = bridge_state() {
        let dropped = state.take_pending().len();
        state.completions = None;
        info!(dropped, "Attestation bridge shut down");
    }
}

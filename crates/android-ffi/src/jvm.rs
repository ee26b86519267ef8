//! Process-wide JVM handle and companion reference.

use jni::objects::{GlobalRef, JObject};
use jni::{JNIEnv, JavaVM};

use crate::error::BridgeError;

/// Local references a single bridge call may hold at once.
const LOCAL_FRAME_CAPACITY: i32 = 32;

/// Everything a worker thread needs to reach the companion object.
///
/// The companion is held as a global reference captured on the host thread,
/// so workers never resolve application classes through `FindClass` (which
/// only sees the system class loader on natively attached threads).
pub struct JvmContext {
    vm: JavaVM,
    companion: GlobalRef,
}

impl JvmContext {
    pub fn new(vm: JavaVM, companion: GlobalRef) -> Self {
        Self { vm, companion }
    }

    pub fn companion(&self) -> &JObject<'static> {
        self.companion.as_obj()
    }

    /// Run `f` on the calling thread, attached to the JVM, inside a fresh
    /// local reference frame.
    ///
    /// Threads that are already attached stay attached; threads attached here
    /// are detached when the guard drops. Every local reference created by `f`
    /// is released when the frame pops, on both the success and error paths.
    pub fn with_env<R, F>(&self, f: F) -> Result<R, BridgeError>
    where
        F: FnOnce(&mut JNIEnv<'_>, &JObject<'static>) -> Result<R, BridgeError>,
    {
        let mut guard = self
            .vm
            .attach_current_thread()
            .map_err(BridgeError::Attach)?;
        let companion = self.companion.as_obj();
        guard.with_local_frame(LOCAL_FRAME_CAPACITY, |env| f(env, companion))
    }
}

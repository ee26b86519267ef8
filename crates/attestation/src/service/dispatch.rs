//! Dispatch boundary.
//!
//! Every provider call runs on the runtime's blocking pool. The outcome,
//! whatever it is, becomes exactly one [`Notification`] on the completion
//! channel. Provider errors, worker panics and timeouts never cross back to
//! the caller.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinError;
use tracing::{debug, error, warn};

use super::completion::{CompletionSender, Notification};
use super::lifecycle::{RequestLifecycle, RequestPhase};
use super::{Operation, RequestId};
use crate::error::{Fault, ProviderError, ServiceResult};

pub(crate) struct Dispatcher {
    /// Present when the dispatcher built its own runtime.
    runtime: Option<Runtime>,
    handle: Handle,
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub(crate) fn owned(worker_threads: usize, timeout: Option<Duration>) -> ServiceResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("attestbridge-dispatch")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        debug!(worker_threads, "Dispatch runtime started");

        Ok(Self {
            runtime: Some(runtime),
            handle,
            timeout,
        })
    }

    pub(crate) fn borrowed(handle: Handle, timeout: Option<Duration>) -> Self {
        Self {
            runtime: None,
            handle,
            timeout,
        }
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Hand `job` to a blocking worker and return immediately.
    ///
    /// `on_success` turns the provider value into the success notification.
    pub(crate) fn dispatch<T, F>(
        &self,
        request_id: RequestId,
        operation: Operation,
        completions: CompletionSender,
        job: F,
        on_success: fn(RequestId, T) -> Notification,
    ) where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ProviderError> + Send + 'static,
    {
        let lifecycle = Arc::new(Mutex::new(RequestLifecycle::new(request_id, operation)));
        record(&lifecycle, RequestPhase::Dispatched);
        let timeout = self.timeout;

        let started = Arc::clone(&lifecycle);
        self.handle.spawn(async move {
            let worker = tokio::task::spawn_blocking(move || {
                if !lock(&started).begin_invocation() {
                    debug!(
                        request_id = %request_id,
                        operation = %operation,
                        "Request resolved before a worker was free; skipping provider call"
                    );
                    return None;
                }
                Some(job())
            });

            let joined = match timeout {
                Some(limit) => match tokio::time::timeout(limit, worker).await {
                    Ok(joined) => Some(joined),
                    Err(_) => None,
                },
                None => Some(worker.await),
            };

            let notification = match joined {
                Some(Ok(Some(Ok(value)))) => {
                    record(&lifecycle, RequestPhase::Succeeded);
                    debug!(request_id = %request_id, operation = %operation, "Request succeeded");
                    on_success(request_id, value)
                }
                Some(Ok(Some(Err(e)))) => {
                    record(&lifecycle, RequestPhase::Failed);
                    let fault = Fault::from_provider(operation, &e);
                    warn!(
                        request_id = %request_id,
                        operation = %operation,
                        kind = %fault.kind,
                        "{}",
                        fault
                    );
                    Notification::failure(request_id, operation, fault)
                }
                // Skipped calls only follow a timeout, so this is not expected.
                Some(Ok(None)) => {
                    record(&lifecycle, RequestPhase::Failed);
                    let fault = Fault::unknown(operation, None);
                    error!(request_id = %request_id, operation = %operation, "{}", fault);
                    Notification::failure(request_id, operation, fault)
                }
                Some(Err(join_error)) => {
                    record(&lifecycle, RequestPhase::Failed);
                    let fault = fault_from_join(operation, join_error);
                    error!(request_id = %request_id, operation = %operation, "{}", fault);
                    Notification::failure(request_id, operation, fault)
                }
                None => {
                    record(&lifecycle, RequestPhase::Failed);
                    let limit_ms = timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
                    let fault = Fault::timed_out(operation, limit_ms);
                    error!(request_id = %request_id, operation = %operation, limit_ms, "{}", fault);
                    Notification::failure(request_id, operation, fault)
                }
            };

            if completions.send(notification).is_err() {
                warn!(
                    request_id = %request_id,
                    operation = %operation,
                    "Completion queue dropped; outcome discarded"
                );
                return;
            }
            let mut lifecycle = lock(&lifecycle);
            lifecycle.record(RequestPhase::NotificationDelivered);
            lifecycle.record(RequestPhase::Idle);
        });
    }
}

fn lock(lifecycle: &Mutex<RequestLifecycle>) -> MutexGuard<'_, RequestLifecycle> {
    lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record(lifecycle: &Mutex<RequestLifecycle>, phase: RequestPhase) {
    lock(lifecycle).record(phase);
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn fault_from_join(operation: Operation, join_error: JoinError) -> Fault {
    if join_error.is_panic() {
        let payload = join_error.into_panic();
        Fault::unknown(operation, panic_message(payload.as_ref()))
    } else {
        Fault::unknown(operation, None)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}

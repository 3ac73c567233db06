//! Call dispatch.
//!
//! Turns one call envelope into exactly one response envelope. The dispatcher
//! holds no per-call state; overlapping calls are safe because each works
//! from its own registry snapshot.

use crate::capability::CapabilityRegistry;
use crate::envelope::{CallEnvelope, ResponseEnvelope};
use crate::error::CallError;
use crate::metrics::{BridgeMetrics, DispatchTimer};
use crate::telemetry::DISPATCH_TARGET;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, instrument};

/// Routes call envelopes to registered handlers
pub struct CallDispatcher {
    registry: Arc<CapabilityRegistry>,
    metrics: Arc<BridgeMetrics>,
}

impl CallDispatcher {
    /// Create a dispatcher over a registry
    pub fn new(registry: Arc<CapabilityRegistry>, metrics: Arc<BridgeMetrics>) -> Self {
        Self { registry, metrics }
    }

    /// Dispatch one call and build its response.
    ///
    /// Never fails: unknown names, handler errors and handler panics all become
    /// failure responses. The handler runs on its own Tokio task, so this must
    /// be awaited inside a Tokio runtime.
    #[instrument(skip(self, call), fields(interface = %call.interface_name, method = %call.method_name, call_id = %call.call_id))]
    pub async fn handle_call(&self, call: CallEnvelope) -> ResponseEnvelope {
        let timer = DispatchTimer::start();
        let CallEnvelope {
            interface_name,
            method_name,
            args,
            call_id,
        } = call;

        let snapshot = self.registry.snapshot();
        let debug_enabled = snapshot.debug();

        let outcome = if !snapshot.has_interface(&interface_name) {
            Err(CallError::interface_not_found(&interface_name))
        } else {
            match snapshot.handler(&interface_name, &method_name) {
                None => Err(CallError::method_not_found(&interface_name, &method_name)),
                Some(handler) => {
                    drop(snapshot);
                    if debug_enabled {
                        // Built outside the macro: its field scope shadows `Value`
                        let args_json = Value::Array(args.clone());
                        debug!(
                            target: DISPATCH_TARGET,
                            interface = %interface_name,
                            method = %method_name,
                            call_id = %call_id,
                            args = %args_json,
                            "Invoking bridge method"
                        );
                    }
                    let task = tokio::spawn(async move { handler(args).await });
                    match task.await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(err)) => Err(CallError::handler_failed(failure_message(&err))),
                        Err(join_error) => Err(CallError::handler_failed(join_message(join_error))),
                    }
                }
            }
        };

        self.metrics
            .record_call(timer.elapsed(), outcome.as_ref().err().map(|e| e.code));

        match outcome {
            Ok(result) => {
                if debug_enabled {
                    debug!(
                        target: DISPATCH_TARGET,
                        interface = %interface_name,
                        method = %method_name,
                        call_id = %call_id,
                        result = %result,
                        "Bridge method succeeded"
                    );
                }
                ResponseEnvelope::success(call_id, result)
            }
            Err(error) => {
                if debug_enabled {
                    debug!(
                        target: DISPATCH_TARGET,
                        interface = %interface_name,
                        method = %method_name,
                        call_id = %call_id,
                        code = %error.code,
                        error = %error.message,
                        "Bridge method failed"
                    );
                }
                ResponseEnvelope::from_error(call_id, &error)
            }
        }
    }
}

fn failure_message(err: &anyhow::Error) -> String {
    let message = format!("{:#}", err);
    if message.is_empty() {
        "Unknown error".to_string()
    } else {
        message
    }
}

fn join_message(err: JoinError) -> String {
    if err.is_cancelled() {
        return "handler was cancelled".to_string();
    }
    panic_message(err.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

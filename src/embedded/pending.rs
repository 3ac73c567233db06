//! Pending-call table for the native embedded runtime.
//!
//! Mirrors the table the bootstrap keeps in `window`: one entry per issued
//! call, removed exactly once when its response arrives.

use crate::envelope::ResponseEnvelope;
use crate::error::{CallError, ErrorCode};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{trace, warn};

/// Outcome delivered to a waiting caller
pub type CallOutcome = Result<Value, CallError>;

/// Table of calls awaiting a response, keyed by call id
#[derive(Default)]
pub struct PendingCalls {
    entries: DashMap<String, oneshot::Sender<CallOutcome>>,
}

impl PendingCalls {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and get the receiver its outcome will arrive on
    pub fn register(&self, call_id: impl Into<String>) -> oneshot::Receiver<CallOutcome> {
        let call_id = call_id.into();
        let (tx, rx) = oneshot::channel();
        if let Some(displaced) = self.entries.insert(call_id.clone(), tx) {
            warn!(call_id = %call_id, "Replaced a pending call with a duplicate id");
            let _ = displaced.send(Err(CallError::new(
                ErrorCode::InternalError,
                format!("Call id '{}' was reused by a newer call", call_id),
            )));
        }
        rx
    }

    /// Remove an entry without settling it
    pub fn remove(&self, call_id: &str) -> bool {
        self.entries.remove(call_id).is_some()
    }

    /// Settle the entry matching `response`. Unknown ids are ignored.
    pub fn settle(&self, response: &ResponseEnvelope) -> bool {
        let Some((_, tx)) = self.entries.remove(&response.call_id) else {
            trace!(call_id = %response.call_id, "Ignoring response with no pending call");
            return false;
        };

        let outcome = if response.success {
            Ok(response.result.clone().unwrap_or(Value::Null))
        } else {
            Err(CallError::from_wire(
                response.error.as_deref().unwrap_or("Unknown error"),
            ))
        };
        // The caller may have stopped waiting; that is not an error here
        let _ = tx.send(outcome);
        true
    }

    /// Drop every entry; waiting callers observe an environment reset
    pub fn reset(&self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    /// Number of outstanding calls
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is outstanding
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a call id is outstanding
    pub fn contains(&self, call_id: &str) -> bool {
        self.entries.contains_key(call_id)
    }
}

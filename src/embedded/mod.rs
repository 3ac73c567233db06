//! Native embedded-side runtime.
//!
//! The generated bootstrap gives web content promise-returning stubs. This
//! module gives the same call semantics to embedded content written in Rust
//! (a WASM guest, a native view, a test harness): issue a call envelope over a
//! text transport, park the caller in a pending table, and settle it when the
//! host's response arrives.

pub mod pending;

pub use pending::{CallOutcome, PendingCalls};

use crate::config::BridgeConfig;
use crate::envelope::{CallEnvelope, ResponseEnvelope};
use crate::error::{CallError, ErrorCode, ScriptError};
use crate::script::parse_response_script;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Outward text channel from the embedded environment to the host
pub trait Transport: Send + Sync {
    /// Post one message to the host
    fn post_message(&self, message: &str) -> Result<(), ScriptError>;
}

impl<F> Transport for F
where
    F: Fn(&str) -> Result<(), ScriptError> + Send + Sync,
{
    fn post_message(&self, message: &str) -> Result<(), ScriptError> {
        self(message)
    }
}

/// Caller side of the bridge for native embedded content
pub struct EmbeddedClient {
    transport: RwLock<Option<Arc<dyn Transport>>>,
    pending: PendingCalls,
    session: String,
    sequence: AtomicU64,
}

impl EmbeddedClient {
    /// Create a client; `None` models an environment without an outward channel
    pub fn new(transport: Option<Arc<dyn Transport>>) -> Self {
        Self {
            transport: RwLock::new(transport),
            pending: PendingCalls::new(),
            session: Uuid::new_v4().simple().to_string(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Attach or detach the outward channel
    pub fn set_transport(&self, transport: Option<Arc<dyn Transport>>) {
        *self.transport.write() = transport;
    }

    fn next_call_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.session, seq)
    }

    /// Call a host method and wait for its outcome.
    ///
    /// Fails immediately with `TRANSPORT_UNAVAILABLE` when there is no
    /// channel; no pending entry is left behind in that case. There is no
    /// timeout: wrap the future in `tokio::time::timeout` if bounded waiting
    /// is needed.
    #[instrument(skip(self, args))]
    pub async fn call(&self, interface: &str, method: &str, args: Vec<Value>) -> CallOutcome {
        let transport = self
            .transport
            .read()
            .clone()
            .ok_or_else(CallError::transport_unavailable)?;

        let call_id = self.next_call_id();
        let receiver = self.pending.register(call_id.clone());
        let envelope = CallEnvelope::new(interface, method, args, call_id.clone());

        let sent = envelope
            .to_json()
            .map_err(|e| CallError::new(ErrorCode::SerializationError, e.to_string()))
            .and_then(|message| {
                transport
                    .post_message(&message)
                    .map_err(|e| CallError::new(ErrorCode::TransportUnavailable, e.to_string()))
            });
        if let Err(e) = sent {
            self.pending.remove(&call_id);
            return Err(e);
        }

        debug!(call_id = %call_id, "Call posted");
        receiver
            .await
            .unwrap_or_else(|_| Err(CallError::environment_reset()))
    }

    /// Settle a pending call from a response envelope
    pub fn handle_response(&self, response: &ResponseEnvelope) -> bool {
        self.pending.settle(response)
    }

    /// Settle a pending call from response JSON. Malformed input is ignored.
    pub fn handle_response_json(&self, raw: &str) -> bool {
        match ResponseEnvelope::from_json(raw) {
            Ok(response) => self.handle_response(&response),
            Err(_) => false,
        }
    }

    /// Settle a pending call from a snippet produced by the host's response router
    pub fn handle_response_script(&self, script: &str, config: &BridgeConfig) -> bool {
        match parse_response_script(script, config) {
            Some(response) => self.handle_response(&response),
            None => false,
        }
    }

    /// Discard every pending call, as happens when the environment reloads
    pub fn reset(&self) -> usize {
        self.pending.reset()
    }

    /// Number of calls awaiting a response
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

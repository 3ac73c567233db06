//! Host side of the bridge.
//!
//! [`JsBridge`] ties the pieces together for one embedded content surface:
//!
//! ```text
//! embedded script ──postMessage(text)──▶ JsBridge::on_message
//!                                          │ classify
//!                      ┌───────────────────┴──────────────┐
//!                      ▼                                  ▼
//!               CallDispatcher                  generic message handler
//!                      │ ResponseEnvelope
//!                      ▼
//!               ResponseRouter ──execute_script──▶ embedded response handler
//! ```

pub mod dispatcher;
pub mod router;

pub use dispatcher::CallDispatcher;
pub use router::{ResponseRouter, ScriptExecutor};

use crate::capability::CapabilityRegistry;
use crate::config::BridgeConfig;
use crate::envelope::{CallEnvelope, InboundMessage, ResponseEnvelope};
use crate::error::Result;
use crate::metrics::{BridgeMetrics, BridgeStats};
use crate::script::{bootstrap_fingerprint, generate_injection_script};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace};

/// Receives inbound messages that are not bridge calls
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// A call was dispatched and its response sent back (or dropped)
    Dispatched {
        /// Correlation id of the call
        call_id: String,
        /// Whether the handler succeeded
        success: bool,
        /// Whether the response reached the embedded environment
        delivered: bool,
    },
    /// Passed to the generic message handler
    Forwarded,
    /// Not a call and no generic handler is set
    Unhandled,
}

/// Host-side bridge for one embedded content surface
pub struct JsBridge {
    config: RwLock<Arc<BridgeConfig>>,
    registry: Arc<CapabilityRegistry>,
    dispatcher: CallDispatcher,
    router: ResponseRouter,
    message_handler: RwLock<Option<MessageHandler>>,
    injected_fingerprint: Mutex<Option<String>>,
    metrics: Arc<BridgeMetrics>,
}

impl JsBridge {
    /// Create a bridge with an initial configuration
    pub fn new(config: BridgeConfig, executor: Arc<dyn ScriptExecutor>) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(BridgeMetrics::new());
        let registry = Arc::new(CapabilityRegistry::new());
        registry.configure(&config.interfaces, config.debug);

        info!(
            interfaces = config.interfaces.len(),
            debug = config.debug,
            "Initializing JS bridge"
        );

        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            dispatcher: CallDispatcher::new(Arc::clone(&registry), Arc::clone(&metrics)),
            router: ResponseRouter::new(executor, Arc::clone(&metrics)),
            registry,
            message_handler: RwLock::new(None),
            injected_fingerprint: Mutex::new(None),
            metrics,
        })
    }

    /// Replace the whole configuration.
    ///
    /// Calls already past lookup finish against their old handler. The
    /// embedded side keeps its old stubs until the next injection.
    pub fn configure(&self, config: BridgeConfig) -> Result<()> {
        config.validate()?;

        let mut current = self.config.write();
        self.registry.configure(&config.interfaces, config.debug);
        info!(
            interfaces = config.interfaces.len(),
            debug = config.debug,
            "Reconfigured JS bridge"
        );
        *current = Arc::new(config);
        Ok(())
    }

    fn config(&self) -> Arc<BridgeConfig> {
        Arc::clone(&self.config.read())
    }

    /// Set the handler for inbound messages that are not bridge calls
    pub fn set_message_handler<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.message_handler.write() = Some(Arc::new(handler));
    }

    /// Remove the generic message handler
    pub fn clear_message_handler(&self) {
        *self.message_handler.write() = None;
    }

    /// Dispatch a call envelope without delivering the response
    pub async fn handle_call(&self, call: CallEnvelope) -> ResponseEnvelope {
        self.dispatcher.handle_call(call).await
    }

    /// Process one message received from the embedded environment.
    ///
    /// Never fails. Calls are dispatched and answered; everything else goes to
    /// the generic message handler.
    #[instrument(skip(self, raw), fields(len = raw.len()))]
    pub async fn on_message(&self, raw: &str) -> MessageOutcome {
        match InboundMessage::classify(raw) {
            InboundMessage::Call(call) => {
                let call_id = call.call_id.clone();
                let response = self.dispatcher.handle_call(call).await;
                let delivered = self.router.deliver(&response, &self.config());
                MessageOutcome::Dispatched {
                    call_id,
                    success: response.success,
                    delivered,
                }
            }
            InboundMessage::Other(text) => {
                let handler = self.message_handler.read().clone();
                match handler {
                    Some(handler) => {
                        handler(&text);
                        self.metrics.record_forwarded();
                        MessageOutcome::Forwarded
                    }
                    None => {
                        trace!("No message handler for non-bridge message");
                        MessageOutcome::Unhandled
                    }
                }
            }
        }
    }

    /// Process a message on its own task so calls can overlap
    pub fn spawn_message(self: &Arc<Self>, raw: String) -> JoinHandle<MessageOutcome> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move { bridge.on_message(&raw).await })
    }

    /// Render the bootstrap for the current registry (empty if nothing is registered)
    pub fn generate_injection_script(&self) -> Result<String> {
        generate_injection_script(&self.registry.snapshot(), &self.config())
    }

    /// Inject the bootstrap after content finished loading.
    ///
    /// Must run after every navigation or reload: a fresh script environment
    /// has none of the injected globals. Returns `false` when there is nothing
    /// to inject.
    pub fn on_load_finished(&self) -> Result<bool> {
        let config = self.config();
        let snapshot = self.registry.snapshot();
        let script = generate_injection_script(&snapshot, &config)?;

        if script.is_empty() {
            *self.injected_fingerprint.lock() = None;
            debug!("Registry empty, skipping bootstrap injection");
            return Ok(false);
        }

        self.router.execute(&script)?;
        *self.injected_fingerprint.lock() = Some(bootstrap_fingerprint(&snapshot, &config)?);
        self.metrics.record_injection();
        debug!(interfaces = snapshot.interface_names().len(), "Injected bootstrap");
        Ok(true)
    }

    /// Forget the injected bootstrap; its environment is being torn down
    pub fn on_navigation_started(&self) {
        *self.injected_fingerprint.lock() = None;
    }

    /// Whether the embedded stubs no longer match the registry
    pub fn needs_reinjection(&self) -> Result<bool> {
        let snapshot = self.registry.snapshot();
        let current = if snapshot.is_empty() {
            None
        } else {
            Some(bootstrap_fingerprint(&snapshot, &self.config())?)
        };
        Ok(*self.injected_fingerprint.lock() != current)
    }

    /// Interface names in configuration order
    pub fn list_interface_names(&self) -> Vec<String> {
        self.registry.list_interface_names()
    }

    /// Check if an interface is registered
    pub fn has_interface(&self, name: &str) -> bool {
        self.registry.has_interface(name)
    }

    /// Check if a method is registered on an interface
    pub fn has_method(&self, interface: &str, method: &str) -> bool {
        self.registry.has_method(interface, method)
    }

    /// Shared metrics collector
    pub fn metrics(&self) -> Arc<BridgeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Snapshot of the bridge counters
    pub fn stats(&self) -> BridgeStats {
        self.metrics.stats()
    }
}

//! Capability objects and the registry that exposes them.
//!
//! A capability object is a named group of methods the embedded environment
//! may call. The registry is rebuilt from scratch on every configuration and
//! swapped in as one immutable snapshot, so a dispatch in flight never sees a
//! half-applied configuration.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result produced by a handler
pub type HandlerResult = anyhow::Result<Value>;

/// Boxed future returned by every handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Type-erased method handler taking the positional call arguments
pub type MethodHandler = Arc<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>;

/// A single callable method on a capability object
#[derive(Clone)]
pub struct Method {
    name: String,
    handler: MethodHandler,
}

impl Method {
    /// Create a method backed by a synchronous handler
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> HandlerResult + Send + Sync + 'static,
    {
        let handler: MethodHandler = Arc::new(move |args: Vec<Value>| -> HandlerFuture {
            let outcome = handler(args);
            Box::pin(async move { outcome })
        });
        Self {
            name: name.into(),
            handler,
        }
    }

    /// Create a method backed by an asynchronous handler
    pub fn new_async<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let handler: MethodHandler = Arc::new(move |args: Vec<Value>| -> HandlerFuture {
            Box::pin(handler(args))
        });
        Self {
            name: name.into(),
            handler,
        }
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the handler
    pub fn handler(&self) -> MethodHandler {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("name", &self.name).finish()
    }
}

/// A named group of methods
#[derive(Debug, Clone)]
pub struct CapabilityObject {
    name: String,
    methods: Vec<Method>,
}

impl CapabilityObject {
    /// Create an empty capability object
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Add a method, replacing any existing method with the same name
    pub fn with_method(mut self, method: Method) -> Self {
        match self.methods.iter_mut().find(|m| m.name == method.name) {
            Some(existing) => *existing = method,
            None => self.methods.push(method),
        }
        self
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Methods in registration order
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }
}

#[derive(Default)]
struct InterfaceEntry {
    method_names: Vec<String>,
    handlers: HashMap<String, MethodHandler>,
}

/// Immutable view of one configuration
#[derive(Default)]
pub struct RegistrySnapshot {
    order: Vec<String>,
    interfaces: HashMap<String, InterfaceEntry>,
    debug: bool,
}

impl RegistrySnapshot {
    fn build(objects: &[CapabilityObject], debug: bool) -> Self {
        let mut snapshot = Self {
            debug,
            ..Self::default()
        };

        for object in objects {
            // A repeated interface name keeps its first position but takes the later method set
            if !snapshot.interfaces.contains_key(&object.name) {
                snapshot.order.push(object.name.clone());
            }

            let mut entry = InterfaceEntry::default();
            for method in &object.methods {
                if entry
                    .handlers
                    .insert(method.name.clone(), method.handler())
                    .is_none()
                {
                    entry.method_names.push(method.name.clone());
                }
            }
            snapshot.interfaces.insert(object.name.clone(), entry);
        }

        snapshot
    }

    /// Check if an interface is registered
    pub fn has_interface(&self, name: &str) -> bool {
        self.interfaces.contains_key(name)
    }

    /// Check if a method is registered on an interface
    pub fn has_method(&self, interface: &str, method: &str) -> bool {
        self.interfaces
            .get(interface)
            .map_or(false, |entry| entry.handlers.contains_key(method))
    }

    /// Interface names in configuration order
    pub fn interface_names(&self) -> &[String] {
        &self.order
    }

    /// Method names of an interface in registration order (empty when absent)
    pub fn method_names(&self, interface: &str) -> &[String] {
        self.interfaces
            .get(interface)
            .map(|entry| entry.method_names.as_slice())
            .unwrap_or(&[])
    }

    /// Look up a handler
    pub fn handler(&self, interface: &str, method: &str) -> Option<MethodHandler> {
        self.interfaces
            .get(interface)
            .and_then(|entry| entry.handlers.get(method))
            .cloned()
    }

    /// Whether debug tracing was requested by this configuration
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Whether no interfaces are registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Registry of capability objects, replaced wholesale on configure
#[derive(Default)]
pub struct CapabilityRegistry {
    current: RwLock<Arc<RegistrySnapshot>>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all registry content in one step
    pub fn configure(&self, interfaces: &[CapabilityObject], debug: bool) {
        let snapshot = Arc::new(RegistrySnapshot::build(interfaces, debug));
        *self.current.write() = snapshot;
    }

    /// Current snapshot; stays valid even if the registry is reconfigured
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Check if an interface is registered
    pub fn has_interface(&self, name: &str) -> bool {
        self.snapshot().has_interface(name)
    }

    /// Check if a method is registered on an interface
    pub fn has_method(&self, interface: &str, method: &str) -> bool {
        self.snapshot().has_method(interface, method)
    }

    /// Interface names in configuration order
    pub fn list_interface_names(&self) -> Vec<String> {
        self.snapshot().interface_names().to_vec()
    }

    /// Method names of an interface (empty when absent)
    pub fn list_methods(&self, interface: &str) -> Vec<String> {
        self.snapshot().method_names(interface).to_vec()
    }

    /// Whether no interfaces are registered
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Whether debug tracing is on
    pub fn debug_enabled(&self) -> bool {
        self.snapshot().debug()
    }
}

/// Helpers for reading positional handler arguments
pub mod args {
    use anyhow::Context;
    use serde::de::DeserializeOwned;
    use serde_json::Value;

    /// Deserialize the argument at `index`
    pub fn arg<T: DeserializeOwned>(args: &[Value], index: usize) -> anyhow::Result<T> {
        let value = args
            .get(index)
            .cloned()
            .with_context(|| format!("missing argument at index {}", index))?;
        serde_json::from_value(value).with_context(|| format!("invalid argument at index {}", index))
    }
}

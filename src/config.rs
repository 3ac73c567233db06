//! Bridge configuration types and defaults.
//!
//! A [`BridgeConfig`] is the single value supplied at setup (and again at
//! every reconfiguration). It carries the capability objects to expose plus
//! the options that shape the generated bootstrap script.

use crate::capability::CapabilityObject;
use serde::{Deserialize, Serialize};

/// Default global owning the outward `postMessage` primitive (`window.ipc`)
pub const DEFAULT_IPC_OBJECT: &str = "ipc";

/// Default global holding the embedded-side pending-call table
pub const DEFAULT_PENDING_GLOBAL: &str = "__nexusBridgePending";

/// Default global holding the embedded-side response handler
pub const DEFAULT_RESPONSE_HANDLER_GLOBAL: &str = "__nexusBridgeHandleResponse";

/// Globals the bootstrap and response snippets rely on; stubs must never replace them
pub const RESERVED_GLOBALS: &[&str] = &[
    "window",
    "globalThis",
    "self",
    "Object",
    "Array",
    "JSON",
    "Promise",
    "Error",
    "String",
    "undefined",
    "NaN",
    "Infinity",
];

/// Suffix of the call-sequence counter the bootstrap keeps beside the pending table
pub const SEQUENCE_SUFFIX: &str = "Seq";

/// Configuration for the bridge
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Capability objects exposed to the embedded environment
    #[serde(skip)]
    pub interfaces: Vec<CapabilityObject>,

    /// Trace every call before and after dispatch (default: false)
    #[serde(default)]
    pub debug: bool,

    /// Global object whose `postMessage` sends text to the host
    #[serde(default = "default_ipc_object")]
    pub ipc_object: String,

    /// Global name of the pending-call table
    #[serde(default = "default_pending_global")]
    pub pending_global: String,

    /// Global name of the response handler function
    #[serde(default = "default_response_handler_global")]
    pub response_handler_global: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
            debug: false,
            ipc_object: DEFAULT_IPC_OBJECT.to_string(),
            pending_global: DEFAULT_PENDING_GLOBAL.to_string(),
            response_handler_global: DEFAULT_RESPONSE_HANDLER_GLOBAL.to_string(),
        }
    }
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.interfaces.iter().map(|i| i.name()).collect();
        f.debug_struct("BridgeConfig")
            .field("interfaces", &names)
            .field("debug", &self.debug)
            .field("ipc_object", &self.ipc_object)
            .field("pending_global", &self.pending_global)
            .field("response_handler_global", &self.response_handler_global)
            .finish()
    }
}

impl BridgeConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the non-handler options from JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Add a capability object
    pub fn with_interface(mut self, interface: CapabilityObject) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Replace all capability objects
    pub fn with_interfaces(mut self, interfaces: Vec<CapabilityObject>) -> Self {
        self.interfaces = interfaces;
        self
    }

    /// Enable debug tracing
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the global owning `postMessage`
    pub fn with_ipc_object(mut self, name: impl Into<String>) -> Self {
        self.ipc_object = name.into();
        self
    }

    /// Set the pending table and response handler global names
    pub fn with_globals(
        mut self,
        pending_global: impl Into<String>,
        response_handler_global: impl Into<String>,
    ) -> Self {
        self.pending_global = pending_global.into();
        self.response_handler_global = response_handler_global.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for interface in &self.interfaces {
            if interface.name().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "interfaces".into(),
                    reason: "interface name must not be empty".into(),
                });
            }
            if interface.methods().iter().any(|m| m.name().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("interfaces.{}", interface.name()),
                    reason: "method name must not be empty".into(),
                });
            }
        }

        for (field, value) in [
            ("ipc_object", &self.ipc_object),
            ("pending_global", &self.pending_global),
            ("response_handler_global", &self.response_handler_global),
        ] {
            if !is_identifier(value) {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    reason: format!("'{}' is not a valid script identifier", value),
                });
            }
        }

        let sequence_global = self.sequence_global();
        let bridge_globals = [
            ("ipc_object", self.ipc_object.as_str()),
            ("pending_global", self.pending_global.as_str()),
            ("pending_global sequence", sequence_global.as_str()),
            ("response_handler_global", self.response_handler_global.as_str()),
        ];
        for (i, (field, value)) in bridge_globals.iter().enumerate() {
            if let Some((other, _)) = bridge_globals[..i].iter().find(|(_, v)| v == value) {
                return Err(ConfigError::InvalidValue {
                    field: (*field).into(),
                    reason: format!("'{}' is already used by {}", value, other),
                });
            }
        }
        for (field, value) in &bridge_globals[1..] {
            if RESERVED_GLOBALS.contains(value) {
                return Err(ConfigError::InvalidValue {
                    field: (*field).into(),
                    reason: format!("'{}' is a reserved global", value),
                });
            }
        }

        for interface in &self.interfaces {
            let name = interface.name();
            if RESERVED_GLOBALS.contains(&name) {
                return Err(ConfigError::InvalidValue {
                    field: format!("interfaces.{}", name),
                    reason: "interface name is a reserved global".into(),
                });
            }
            if let Some((field, _)) = bridge_globals.iter().find(|(_, v)| *v == name) {
                return Err(ConfigError::InvalidValue {
                    field: format!("interfaces.{}", name),
                    reason: format!("interface name collides with {}", field),
                });
            }
        }

        Ok(())
    }

    /// Global name of the call-sequence counter derived from `pending_global`
    pub fn sequence_global(&self) -> String {
        format!("{}{}", self.pending_global, SEQUENCE_SUFFIX)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The field name
        field: String,
        /// The reason it's invalid
        reason: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Default value functions for serde
fn default_ipc_object() -> String {
    DEFAULT_IPC_OBJECT.to_string()
}

fn default_pending_global() -> String {
    DEFAULT_PENDING_GLOBAL.to_string()
}

fn default_response_handler_global() -> String {
    DEFAULT_RESPONSE_HANDLER_GLOBAL.to_string()
}

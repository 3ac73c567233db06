//! Error types for the bridge.
//!
//! Two layers live here. [`CallError`] is what a caller in the embedded
//! environment sees: it travels over the wire as the `error` string of a
//! response envelope. [`BridgeError`] covers host-level failures
//! (configuration, serialization, script execution) that never reach a caller.

use serde::{Deserialize, Serialize};

/// Message used when the embedded side has no way to post messages outward.
pub const TRANSPORT_UNAVAILABLE_MESSAGE: &str = "JS interface transport is not available";

/// Message used for pending calls discarded by an environment reset.
pub const ENVIRONMENT_RESET_MESSAGE: &str = "Script environment was reset before the call settled";

/// Error codes for categorizing call failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No capability object registered under the requested name
    InterfaceNotFound,
    /// Capability object exists but lacks the requested method
    MethodNotFound,
    /// Handler returned an error or panicked
    HandlerError,
    /// Embedded side cannot send messages outward
    TransportUnavailable,
    /// Serialization/deserialization error
    SerializationError,
    /// Script could not be executed in the embedded environment
    ScriptExecution,
    /// Pending call dropped because its environment went away
    EnvironmentReset,
    /// Invalid argument
    InvalidArgument,
    /// Internal bridge error (bug)
    InternalError,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::InterfaceNotFound => write!(f, "INTERFACE_NOT_FOUND"),
            ErrorCode::MethodNotFound => write!(f, "METHOD_NOT_FOUND"),
            ErrorCode::HandlerError => write!(f, "HANDLER_ERROR"),
            ErrorCode::TransportUnavailable => write!(f, "TRANSPORT_UNAVAILABLE"),
            ErrorCode::SerializationError => write!(f, "SERIALIZATION_ERROR"),
            ErrorCode::ScriptExecution => write!(f, "SCRIPT_EXECUTION"),
            ErrorCode::EnvironmentReset => write!(f, "ENVIRONMENT_RESET"),
            ErrorCode::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// A failed call as reported to the caller that issued it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallError {
    /// Error code
    pub code: ErrorCode,

    /// Human-readable message; this is the wire `error` field verbatim
    pub message: String,
}

impl CallError {
    /// Create a new call error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an interface not found error
    pub fn interface_not_found(name: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InterfaceNotFound,
            format!("Interface '{}' not found", name.into()),
        )
    }

    /// Create a method not found error
    pub fn method_not_found(interface: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::MethodNotFound,
            format!(
                "Method '{}' not found on interface '{}'",
                method.into(),
                interface.into()
            ),
        )
    }

    /// Create a handler failure
    pub fn handler_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::HandlerError, message)
    }

    /// Create a transport unavailable error
    pub fn transport_unavailable() -> Self {
        Self::new(ErrorCode::TransportUnavailable, TRANSPORT_UNAVAILABLE_MESSAGE)
    }

    /// Create an environment reset error
    pub fn environment_reset() -> Self {
        Self::new(ErrorCode::EnvironmentReset, ENVIRONMENT_RESET_MESSAGE)
    }

    /// Rebuild an error from the wire `error` string.
    ///
    /// Only the message travels; the code is recovered for the messages this
    /// crate phrases itself and is `HandlerError` otherwise.
    pub fn from_wire(message: impl Into<String>) -> Self {
        let message = message.into();
        let code = if is_quoted_pattern(&message, "Interface '", "' not found") {
            ErrorCode::InterfaceNotFound
        } else if message.starts_with("Method '") && message.contains("' not found on interface '") {
            ErrorCode::MethodNotFound
        } else if message == TRANSPORT_UNAVAILABLE_MESSAGE {
            ErrorCode::TransportUnavailable
        } else {
            ErrorCode::HandlerError
        };
        Self::new(code, message)
    }
}

fn is_quoted_pattern(message: &str, prefix: &str, suffix: &str) -> bool {
    message.len() >= prefix.len() + suffix.len()
        && message.starts_with(prefix)
        && message.ends_with(suffix)
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CallError {}

/// Failure to run a script in, or post a message from, the embedded environment
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    /// The environment was destroyed or never loaded
    #[error("Script environment unavailable: {0}")]
    Unavailable(String),

    /// The environment rejected the script
    #[error("Script execution failed: {0}")]
    Failed(String),
}

/// Main error type for host-level bridge operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Script execution error
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl BridgeError {
    /// Error code matching this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::Config(_) => ErrorCode::InvalidArgument,
            BridgeError::Script(_) => ErrorCode::ScriptExecution,
            BridgeError::Serialization(_) => ErrorCode::SerializationError,
            BridgeError::InvalidState(_) => ErrorCode::InternalError,
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Serialization(e.to_string())
    }
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

//! Wire envelopes exchanged with the embedded environment.
//!
//! Both directions carry JSON text. Calls flow embedded → host, responses
//! flow host → embedded; each is tagged by a `type` field.

use crate::error::{CallError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `type` tag of a call envelope
pub const CALL_TYPE: &str = "JS_INTERFACE_CALL";

/// `type` tag of a response envelope
pub const RESPONSE_TYPE: &str = "JS_INTERFACE_RESPONSE";

/// Message sent by embedded script to invoke a host method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnvelope {
    /// Capability object name
    pub interface_name: String,

    /// Method name on that object
    pub method_name: String,

    /// Positional arguments
    #[serde(default)]
    pub args: Vec<Value>,

    /// Correlation id, unique among unanswered calls
    pub call_id: String,
}

impl CallEnvelope {
    /// Create a new call envelope
    pub fn new(
        interface_name: impl Into<String>,
        method_name: impl Into<String>,
        args: Vec<Value>,
        call_id: impl Into<String>,
    ) -> Self {
        Self {
            interface_name: interface_name.into(),
            method_name: method_name.into(),
            args,
            call_id: call_id.into(),
        }
    }

    /// Serialize as a tagged wire message
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&BridgeMessage::Call(self.clone()))?)
    }
}

/// Outcome of a call, sent back into the embedded environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Correlation id copied from the call
    pub call_id: String,

    /// Whether the handler succeeded
    pub success: bool,

    /// Handler result (if success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error message (if failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Create a success response
    pub fn success(call_id: impl Into<String>, result: Value) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Create a failure response
    pub fn failure(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Create a failure response from a call error
    pub fn from_error(call_id: impl Into<String>, error: &CallError) -> Self {
        Self::failure(call_id, error.message.clone())
    }

    /// Serialize as a tagged wire message
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&BridgeMessage::Response(self.clone()))?)
    }

    /// Parse a tagged response message
    pub fn from_json(raw: &str) -> Result<Self> {
        match serde_json::from_str::<BridgeMessage>(raw)? {
            BridgeMessage::Response(response) => Ok(response),
            BridgeMessage::Call(_) => Err(crate::error::BridgeError::Serialization(
                "expected a response envelope, got a call envelope".into(),
            )),
        }
    }
}

/// Every bridge message, discriminated by its `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeMessage {
    /// Embedded → host call
    #[serde(rename = "JS_INTERFACE_CALL")]
    Call(CallEnvelope),
    /// Host → embedded response
    #[serde(rename = "JS_INTERFACE_RESPONSE")]
    Response(ResponseEnvelope),
}

/// Classified inbound message from the embedded environment
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// A well-formed call envelope
    Call(CallEnvelope),
    /// Anything else, passed through untouched
    Other(String),
}

impl InboundMessage {
    /// Classify raw message text. Never fails: non-JSON, other JSON shapes and
    /// stray responses all become [`InboundMessage::Other`].
    pub fn classify(raw: &str) -> Self {
        match serde_json::from_str::<BridgeMessage>(raw) {
            Ok(BridgeMessage::Call(call)) => InboundMessage::Call(call),
            _ => InboundMessage::Other(raw.to_string()),
        }
    }
}

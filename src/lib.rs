//! # Nexus WebView Bridge
//!
//! This library lets script running inside an embedded web content surface
//! call named functions implemented by the host application. The only channel
//! between the two sides carries text, so calls and results travel as JSON
//! envelopes and are matched up by correlation id.
//!
//! ## Architecture
//!
//! ```text
//! Embedded script (window.Android.getToken())
//!     │
//!     │ postMessage(JS_INTERFACE_CALL)
//!     ▼
//! JsBridge (this crate)
//!     │  CapabilityRegistry → CallDispatcher → handler
//!     │
//!     │ execute_script(response snippet)
//!     ▼
//! Bootstrap response handler settles the pending promise
//! ```
//!
//! ## Features
//!
//! - **Capability Registry**: named objects of sync or async handlers, swapped atomically
//! - **Bootstrap Generation**: promise-returning stubs synthesized from the registry
//! - **Correlated Responses**: out-of-order completion is safe
//! - **Native Embedded Runtime**: the same call semantics for Rust-side embedded content

#![deny(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod bridge;
pub mod capability;
pub mod config;
pub mod embedded;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod script;
pub mod telemetry;

// Re-export commonly used types
pub use bridge::{CallDispatcher, JsBridge, MessageOutcome, ResponseRouter, ScriptExecutor};
pub use capability::{CapabilityObject, CapabilityRegistry, Method};
pub use config::BridgeConfig;
pub use embedded::{EmbeddedClient, PendingCalls, Transport};
pub use envelope::{CallEnvelope, InboundMessage, ResponseEnvelope};
pub use error::{BridgeError, CallError, ErrorCode, ScriptError};
pub use metrics::{BridgeMetrics, BridgeStats};
pub use telemetry::init_tracing;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

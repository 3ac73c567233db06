//! Script synthesis for the embedded environment.
//!
//! [`generate_injection_script`] renders the bootstrap that defines one
//! global stub object per capability object plus the hidden pending-call
//! table and response handler. [`response_script`] renders the small snippet
//! that hands a response envelope to that handler.

use crate::capability::RegistrySnapshot;
use crate::config::BridgeConfig;
use crate::envelope::{ResponseEnvelope, CALL_TYPE, RESPONSE_TYPE};
use crate::error::{Result, TRANSPORT_UNAVAILABLE_MESSAGE};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Bootstrap template; every `__NEXUS_*__` token is replaced by a JSON literal
pub const BOOTSTRAP_TEMPLATE: &str = include_str!("bootstrap.js");

/// Bumped whenever the template changes shape, so fingerprints differ
const TEMPLATE_VERSION: &str = "v2";

#[derive(Serialize)]
struct InterfaceLayout<'a> {
    name: &'a str,
    methods: &'a [String],
}

fn layout(snapshot: &RegistrySnapshot) -> Vec<InterfaceLayout<'_>> {
    snapshot
        .interface_names()
        .iter()
        .map(|name| InterfaceLayout {
            name: name.as_str(),
            methods: snapshot.method_names(name),
        })
        .collect()
}

/// JSON text safe to embed in script source (JSON allows U+2028/U+2029, older JS does not)
fn js_literal<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(json.replace('\u{2028}', "\\u2028").replace('\u{2029}', "\\u2029"))
}

/// Render the bootstrap script for a registry snapshot.
///
/// Returns an empty string when no interfaces are registered. Each call uses a
/// fresh session token as the call-id prefix, so ids from different injections
/// never collide.
pub fn generate_injection_script(
    snapshot: &RegistrySnapshot,
    config: &BridgeConfig,
) -> Result<String> {
    if snapshot.is_empty() {
        return Ok(String::new());
    }

    let session = Uuid::new_v4().simple().to_string();
    let replacements = [
        ("__NEXUS_PENDING_GLOBAL__", js_literal(&config.pending_global)?),
        (
            "__NEXUS_RESPONSE_HANDLER_GLOBAL__",
            js_literal(&config.response_handler_global)?,
        ),
        ("__NEXUS_IPC_OBJECT__", js_literal(&config.ipc_object)?),
        ("__NEXUS_SESSION__", js_literal(&session)?),
        ("__NEXUS_CALL_TYPE__", js_literal(CALL_TYPE)?),
        ("__NEXUS_RESPONSE_TYPE__", js_literal(RESPONSE_TYPE)?),
        (
            "__NEXUS_TRANSPORT_UNAVAILABLE__",
            js_literal(TRANSPORT_UNAVAILABLE_MESSAGE)?,
        ),
        ("__NEXUS_INTERFACES__", js_literal(&layout(snapshot))?),
    ];

    Ok(substitute(BOOTSTRAP_TEMPLATE, &replacements))
}

const TOKEN_PREFIX: &str = "__NEXUS_";

/// Fill template tokens in one pass; substituted text is never rescanned
fn substitute(template: &str, replacements: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len() + 256);
    let mut rest = template;
    while let Some(start) = rest.find(TOKEN_PREFIX) {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match replacements
            .iter()
            .find(|(token, _)| candidate.starts_with(token))
        {
            Some((token, value)) => {
                out.push_str(value);
                rest = &candidate[token.len()..];
            }
            None => {
                out.push_str(TOKEN_PREFIX);
                rest = &candidate[TOKEN_PREFIX.len()..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Fingerprint of what a bootstrap would define, ignoring its session token.
///
/// Two snapshots with the same interfaces, methods and globals share a
/// fingerprint; the host uses it to tell whether the injected bootstrap is stale.
pub fn bootstrap_fingerprint(snapshot: &RegistrySnapshot, config: &BridgeConfig) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(js_literal(&layout(snapshot))?.as_bytes());
    hasher.update(b"\n");
    hasher.update(config.pending_global.as_bytes());
    hasher.update(b"\n");
    hasher.update(config.response_handler_global.as_bytes());
    hasher.update(b"\n");
    hasher.update(config.ipc_object.as_bytes());
    hasher.update(b":");
    hasher.update(TEMPLATE_VERSION.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

const RESPONSE_SCRIPT_SUFFIX: &str = ");}})();true;";

fn response_script_prefix(config: &BridgeConfig) -> Result<String> {
    let handler = js_literal(&config.response_handler_global)?;
    Ok(format!(
        "(function(){{var h=window[{handler}];if(typeof h===\"function\"){{h("
    ))
}

/// Render the snippet that settles one pending call in the embedded environment
pub fn response_script(response: &ResponseEnvelope, config: &BridgeConfig) -> Result<String> {
    let payload = response
        .to_json()?
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029");
    let mut script = response_script_prefix(config)?;
    script.push_str(&payload);
    script.push_str(RESPONSE_SCRIPT_SUFFIX);
    Ok(script)
}

/// Recover the envelope from a snippet built by [`response_script`].
///
/// Native embedded runtimes cannot evaluate script text; this lets them
/// accept the same snippets a web view would run. Returns `None` for any
/// other script.
pub fn parse_response_script(script: &str, config: &BridgeConfig) -> Option<ResponseEnvelope> {
    let prefix = response_script_prefix(config).ok()?;
    let payload = script
        .strip_prefix(prefix.as_str())?
        .strip_suffix(RESPONSE_SCRIPT_SUFFIX)?;
    ResponseEnvelope::from_json(payload).ok()
}

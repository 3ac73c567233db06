//! Runs the generated bootstrap in QuickJS against a minimal `window`/`ipc`
//! shim, with the host side played by a real `JsBridge`.

use nexus_webview_bridge::error::TRANSPORT_UNAVAILABLE_MESSAGE;
use nexus_webview_bridge::script::response_script;
use nexus_webview_bridge::{
    BridgeConfig, CallEnvelope, CapabilityObject, InboundMessage, JsBridge, Method,
    ResponseEnvelope, ScriptError, ScriptExecutor,
};
use parking_lot::Mutex;
use rquickjs::{Context, Runtime};
use serde_json::{json, Value};
use std::sync::Arc;

const SHIM: &str = r#"
var window = globalThis;
var __sent = [];
var __results = {};
function __track(label, promise) {
  promise.then(
    function (value) { __results[label] = { ok: value === undefined ? null : value }; },
    function (error) { __results[label] = { err: String(error && error.message) }; }
  );
}
"#;

const RECORDING_IPC: &str =
    "window.ipc = { postMessage: function (message) { __sent.push(message); } };";

const THROWING_IPC: &str =
    "window.ipc = { postMessage: function () { throw new Error(\"channel closed\"); } };";

/// One script environment, standing in for a loaded page
struct WebView {
    runtime: Runtime,
    context: Context,
}

impl WebView {
    fn new(ipc: Option<&str>) -> Self {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let view = Self { runtime, context };
        view.run(SHIM);
        if let Some(ipc) = ipc {
            view.run(ipc);
        }
        view
    }

    /// Evaluate a script, reporting whether it completed without throwing
    fn try_run(&self, script: &str) -> bool {
        let ok = self
            .context
            .with(|ctx| ctx.eval::<(), _>(script.to_string()).is_ok());
        self.drain_jobs();
        ok
    }

    fn run(&self, script: &str) {
        assert!(self.try_run(script), "script threw: {}", script);
    }

    fn drain_jobs(&self) {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(_) => panic!("a promise job threw"),
            }
        }
    }

    fn json(&self, expr: &str) -> Value {
        let text = self
            .context
            .with(|ctx| ctx.eval::<String, _>(format!("JSON.stringify({})", expr)))
            .unwrap();
        serde_json::from_str(&text).unwrap()
    }

    fn result(&self, label: &str) -> Value {
        self.json(&format!("__results[{}] || null", json!(label)))
    }

    fn pending_count(&self, config: &BridgeConfig) -> usize {
        let expr = format!(
            "Object.keys(window[{}] || {{}}).length",
            json!(config.pending_global)
        );
        self.json(&expr).as_u64().unwrap() as usize
    }

    /// Take the call envelopes posted since the last call
    fn take_calls(&self) -> Vec<CallEnvelope> {
        self.json("__sent.splice(0)")
            .as_array()
            .unwrap()
            .iter()
            .map(|m| match InboundMessage::classify(m.as_str().unwrap()) {
                InboundMessage::Call(call) => call,
                InboundMessage::Other(other) => panic!("not a call envelope: {}", other),
            })
            .collect()
    }
}

/// Collects the scripts the host asks the view to run
#[derive(Default)]
struct ScriptQueue {
    scripts: Mutex<Vec<String>>,
}

impl ScriptExecutor for ScriptQueue {
    fn execute_script(&self, script: &str) -> Result<(), ScriptError> {
        self.scripts.lock().push(script.to_string());
        Ok(())
    }
}

impl ScriptQueue {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.scripts.lock())
    }
}

fn sample_config() -> BridgeConfig {
    BridgeConfig::new().with_interface(
        CapabilityObject::new("Android")
            .with_method(Method::new("getToken", |_| Ok(json!("abc"))))
            .with_method(Method::new("echo", |args| Ok(Value::Array(args))))
            .with_method(Method::new("fail", |_| {
                Err(anyhow::anyhow!("session expired"))
            })),
    )
}

struct Page {
    view: WebView,
    bridge: JsBridge,
    queue: Arc<ScriptQueue>,
    config: BridgeConfig,
}

impl Page {
    fn load(ipc: Option<&str>) -> Self {
        let config = sample_config();
        let queue = Arc::new(ScriptQueue::default());
        let bridge = JsBridge::new(config.clone(), queue.clone()).unwrap();
        let page = Self {
            view: WebView::new(ipc),
            bridge,
            queue,
            config,
        };
        assert!(page.bridge.on_load_finished().unwrap());
        page.run_host_scripts();
        page
    }

    fn run_host_scripts(&self) {
        for script in self.queue.take() {
            self.view.run(&script);
        }
    }

    /// Carry posted calls to the host and run its responses in the view
    async fn pump(&self) {
        for call in self.view.take_calls() {
            let raw = call.to_json().unwrap();
            self.bridge.on_message(&raw).await;
        }
        self.run_host_scripts();
    }

    fn respond(&self, response: &ResponseEnvelope) -> bool {
        self.view
            .try_run(&response_script(response, &self.config).unwrap())
    }
}

#[tokio::test]
async fn test_stubs_expose_exactly_configured_methods() {
    let page = Page::load(Some(RECORDING_IPC));

    assert_eq!(
        page.view.json("Object.keys(window.Android)"),
        json!(["getToken", "echo", "fail"])
    );
    assert_eq!(page.view.json("typeof Android.getToken"), json!("function"));
    assert_eq!(page.view.json("typeof window.iOS"), json!("undefined"));
    assert_eq!(page.view.pending_count(&page.config), 0);
}

#[tokio::test]
async fn test_call_resolves_with_handler_value() {
    let page = Page::load(Some(RECORDING_IPC));
    page.view.run(
        r#"__track("token", Android.getToken());
           __track("echo", Android.echo(1, "x", { k: true }));"#,
    );
    assert_eq!(page.view.pending_count(&page.config), 2);

    page.pump().await;

    assert_eq!(page.view.result("token"), json!({ "ok": "abc" }));
    assert_eq!(page.view.result("echo"), json!({ "ok": [1, "x", { "k": true }] }));
    assert_eq!(page.view.pending_count(&page.config), 0);
}

#[tokio::test]
async fn test_handler_failure_rejects_with_message() {
    let page = Page::load(Some(RECORDING_IPC));
    page.view.run(r#"__track("fail", Android.fail());"#);
    page.pump().await;

    assert_eq!(page.view.result("fail"), json!({ "err": "session expired" }));
}

#[tokio::test]
async fn test_failure_without_message_rejects_with_unknown_error() {
    let page = Page::load(Some(RECORDING_IPC));
    page.view.run(r#"__track("bare", Android.getToken());"#);
    let calls = page.view.take_calls();

    assert!(page.respond(&ResponseEnvelope {
        call_id: calls[0].call_id.clone(),
        success: false,
        result: None,
        error: None,
    }));
    assert_eq!(page.view.result("bare"), json!({ "err": "Unknown error" }));
}

#[tokio::test]
async fn test_reverse_order_settlement() {
    let page = Page::load(Some(RECORDING_IPC));
    page.view.run(
        r#"__track("first", Android.echo(1));
           __track("second", Android.echo(2));"#,
    );
    let calls = page.view.take_calls();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].call_id, calls[1].call_id);

    assert!(page.respond(&ResponseEnvelope::success(calls[1].call_id.clone(), json!("b"))));
    assert_eq!(page.view.result("first"), Value::Null);
    assert_eq!(page.view.result("second"), json!({ "ok": "b" }));

    assert!(page.respond(&ResponseEnvelope::success(calls[0].call_id.clone(), json!("a"))));
    assert_eq!(page.view.result("first"), json!({ "ok": "a" }));
    assert_eq!(page.view.pending_count(&page.config), 0);
}

#[tokio::test]
async fn test_unmatched_call_ids_have_no_effect() {
    let page = Page::load(Some(RECORDING_IPC));
    page.view.run(r#"__track("waiting", Android.getToken());"#);
    let calls = page.view.take_calls();

    for id in [
        "nobody",
        "constructor",
        "toString",
        "__proto__",
        "hasOwnProperty",
        "valueOf",
    ] {
        assert!(page.respond(&ResponseEnvelope::success(id, json!(1))), "{}", id);
        assert!(page.respond(&ResponseEnvelope::failure(id, "x")), "{}", id);
    }
    assert_eq!(page.view.pending_count(&page.config), 1);
    assert_eq!(page.view.result("waiting"), Value::Null);

    // A repeated response for a settled id is ignored too
    let reply = ResponseEnvelope::success(calls[0].call_id.clone(), json!("abc"));
    assert!(page.respond(&reply));
    assert!(page.respond(&ResponseEnvelope::success(calls[0].call_id.clone(), json!("late"))));
    assert_eq!(page.view.result("waiting"), json!({ "ok": "abc" }));
}

#[tokio::test]
async fn test_response_handler_ignores_foreign_input() {
    let page = Page::load(Some(RECORDING_IPC));
    let handler = json!(page.config.response_handler_global);

    page.view.run(&format!("window[{}](\"not json\");", handler));
    page.view.run(&format!("window[{}](null);", handler));
    page.view.run(&format!(
        "window[{}]({{ type: \"JS_INTERFACE_CALL\", callId: \"x\", success: true }});",
        handler
    ));
}

#[tokio::test]
async fn test_missing_transport_rejects_without_pending_entry() {
    let page = Page::load(None);
    page.view.run(r#"__track("token", Android.getToken());"#);

    assert_eq!(
        page.view.result("token"),
        json!({ "err": TRANSPORT_UNAVAILABLE_MESSAGE })
    );
    assert_eq!(page.view.pending_count(&page.config), 0);
}

#[tokio::test]
async fn test_throwing_transport_removes_pending_entry() {
    let page = Page::load(Some(THROWING_IPC));
    page.view.run(r#"__track("token", Android.getToken());"#);

    assert_eq!(page.view.result("token"), json!({ "err": "channel closed" }));
    assert_eq!(page.view.pending_count(&page.config), 0);
}

#[tokio::test]
async fn test_reinjection_keeps_in_flight_calls() {
    let page = Page::load(Some(RECORDING_IPC));
    page.view.run(r#"__track("before", Android.echo("kept"));"#);
    let before = page.view.take_calls();

    page.view
        .run(&page.bridge.generate_injection_script().unwrap());
    assert_eq!(page.view.pending_count(&page.config), 1);

    page.view.run(r#"__track("after", Android.getToken());"#);
    let after = page.view.take_calls();
    let session = |id: &str| id.rsplit_once('-').map(|(s, _)| s.to_string());
    assert_ne!(session(&before[0].call_id), session(&after[0].call_id));

    for call in before.into_iter().chain(after) {
        page.bridge.on_message(&call.to_json().unwrap()).await;
    }
    page.run_host_scripts();

    assert_eq!(page.view.result("before"), json!({ "ok": ["kept"] }));
    assert_eq!(page.view.result("after"), json!({ "ok": "abc" }));
    assert_eq!(page.view.pending_count(&page.config), 0);
}

//! Response delivery into the embedded environment.

use crate::config::BridgeConfig;
use crate::envelope::ResponseEnvelope;
use crate::error::ScriptError;
use crate::metrics::BridgeMetrics;
use crate::script::response_script;
use std::sync::Arc;
use tracing::{error, trace, warn};

/// Runs script text inside the embedded content's script environment
pub trait ScriptExecutor: Send + Sync {
    /// Execute `script`; fails if the environment is gone or not yet loaded
    fn execute_script(&self, script: &str) -> Result<(), ScriptError>;
}

impl<F> ScriptExecutor for F
where
    F: Fn(&str) -> Result<(), ScriptError> + Send + Sync,
{
    fn execute_script(&self, script: &str) -> Result<(), ScriptError> {
        self(script)
    }
}

/// Sends response envelopes back to the pending caller
pub struct ResponseRouter {
    executor: Arc<dyn ScriptExecutor>,
    metrics: Arc<BridgeMetrics>,
}

impl ResponseRouter {
    /// Create a router over a script executor
    pub fn new(executor: Arc<dyn ScriptExecutor>, metrics: Arc<BridgeMetrics>) -> Self {
        Self { executor, metrics }
    }

    /// Deliver a response. Returns `false` if it had to be dropped; the
    /// embedded caller then stays pending.
    pub fn deliver(&self, response: &ResponseEnvelope, config: &BridgeConfig) -> bool {
        let script = match response_script(response, config) {
            Ok(script) => script,
            Err(e) => {
                error!(call_id = %response.call_id, error = %e, "Failed to encode response");
                self.metrics.record_delivery(false);
                return false;
            }
        };

        let delivered = match self.executor.execute_script(&script) {
            Ok(()) => {
                trace!(call_id = %response.call_id, "Response delivered");
                true
            }
            Err(e) => {
                warn!(call_id = %response.call_id, error = %e, "Dropping response");
                false
            }
        };
        self.metrics.record_delivery(delivered);
        delivered
    }

    /// Run arbitrary script through the same executor
    pub fn execute(&self, script: &str) -> Result<(), ScriptError> {
        self.executor.execute_script(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingExecutor {
        scripts: Mutex<Vec<String>>,
    }

    impl ScriptExecutor for RecordingExecutor {
        fn execute_script(&self, script: &str) -> Result<(), ScriptError> {
            self.scripts.lock().push(script.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_deliver_runs_snippet() {
        let executor = Arc::new(RecordingExecutor::default());
        let metrics = Arc::new(BridgeMetrics::new());
        let router = ResponseRouter::new(executor.clone(), Arc::clone(&metrics));

        let delivered = router.deliver(
            &ResponseEnvelope::success("s-1", json!(5)),
            &BridgeConfig::default(),
        );

        assert!(delivered);
        let scripts = executor.scripts.lock();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains("__nexusBridgeHandleResponse"));
        assert!(scripts[0].contains(r#""callId":"s-1""#));
        assert_eq!(metrics.stats().responses_delivered, 1);
    }

    #[test]
    fn test_deliver_drops_on_executor_failure() {
        let executor = Arc::new(|_: &str| -> Result<(), ScriptError> {
            Err(ScriptError::Unavailable("navigated away".into()))
        });
        let metrics = Arc::new(BridgeMetrics::new());
        let router = ResponseRouter::new(executor, Arc::clone(&metrics));

        let delivered = router.deliver(
            &ResponseEnvelope::failure("s-2", "boom"),
            &BridgeConfig::default(),
        );

        assert!(!delivered);
        assert_eq!(metrics.stats().responses_dropped, 1);
    }
}

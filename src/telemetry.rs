//! Tracing setup for hosts that do not install their own subscriber.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

/// Target used for per-call debug traces
pub const DISPATCH_TARGET: &str = "nexus_webview_bridge::dispatch";

static INIT: OnceCell<bool> = OnceCell::new();

/// Install a fmt subscriber filtered by `RUST_LOG`.
///
/// Defaults to `nexus_webview_bridge=debug` when `RUST_LOG` is unset. Safe to
/// call repeatedly; returns `false` if another global subscriber was already
/// installed by the host.
pub fn init_tracing() -> bool {
    *INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("nexus_webview_bridge=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok()
    })
}

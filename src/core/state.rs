//! Process-wide serve state.
//!
//! - `SHUTDOWN`: Has shutdown been requested? (Ctrl+C received)
//! - `SERVER`: HTTP server to unblock on shutdown
//! - `SESSIONS`: Root cancellation token every push session derives from

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tiny_http::Server;
use tokio_util::sync::CancellationToken;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Root token for all push sessions
static SESSIONS: OnceLock<CancellationToken> = OnceLock::new();

/// Setup the global Ctrl+C handler. Call once at program start
///
/// The handler behavior depends on whether a server has been registered:
/// - Before `register_server()`: exit immediately, nothing to tear down
/// - After `register_server()`: cancel sessions, then unblock the HTTP server
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        if let Some(token) = SESSIONS.get() {
            token.cancel();
        }

        if let Some(server) = SERVER.get() {
            crate::log!("serve"; "shutting down...");
            server.unblock();
        } else {
            std::process::exit(0);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the HTTP server and the session root token for graceful shutdown
///
/// Call this after binding, before entering the request loop
pub fn register_server(server: Arc<Server>, sessions: CancellationToken) {
    let _ = SERVER.set(server);
    let _ = SESSIONS.set(sessions);
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

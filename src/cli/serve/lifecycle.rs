//! Server lifecycle management.

use std::net::TcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use tiny_http::Server;
use tokio_util::sync::CancellationToken;

use crate::core::ServeRoot;
use crate::log;
use crate::reload::server::Supervisor;
use crate::reload::session::SessionConfig;

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Upper bound on waiting for sessions to close at shutdown.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(3);

/// Bind to the specified host and port, with automatic port retry.
///
/// Returns the server and the port actually bound.
pub fn bind_with_retry(host: &str, base_port: u16) -> Result<(Server, u16)> {
    let mut offset = 0;
    loop {
        let port = base_port.saturating_add(offset);

        match Server::http((host, port)) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let port = server
                    .server_addr()
                    .to_ip()
                    .map_or(port, |addr| addr.port());
                return Ok((server, port));
            }
            Err(_) if offset + 1 < MAX_PORT_RETRIES => offset += 1,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to bind after {} attempts (ports {}-{}): {}",
                    MAX_PORT_RETRIES,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
}

/// Run the session supervisor on its own runtime thread.
pub fn spawn_supervisor(
    root: Arc<ServeRoot>,
    config: SessionConfig,
    shutdown: CancellationToken,
    listener: TcpListener,
) -> Result<JoinHandle<()>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    Ok(thread::spawn(move || {
        rt.block_on(async {
            if let Err(e) = Supervisor::new(root, config, shutdown).run(listener).await {
                log!("ws"; "supervisor error: {:#}", e);
            }
        });
    }))
}

/// Wait for the supervisor to close its sessions (bounded).
pub fn wait_for_shutdown(handle: JoinHandle<()>) {
    let step = Duration::from_millis(50);
    let mut waited = Duration::ZERO;

    while waited < SHUTDOWN_WAIT {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(step);
        waited += step;
    }
    crate::debug!("serve"; "sessions still closing, exiting anyway");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_with_retry_skips_busy_port() {
        let (first, port) = bind_with_retry("127.0.0.1", 0).unwrap();
        assert_ne!(port, 0);

        let (_second, next) = bind_with_retry("127.0.0.1", port).unwrap();
        assert_ne!(next, port);
        drop(first);
    }
}

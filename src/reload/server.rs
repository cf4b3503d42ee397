//! Session Supervisor
//!
//! Accepts push connections, validates the requested document before any
//! watch is placed, and runs one Push Session per connection.
//!
//! ```text
//! accept loop ──> handshake (path check) ──> PushSession ──> WsTransport (sink)
//!                                       └──> disconnect watcher (stream)
//! ```
//!
//! Each connection gets its own child token of the shutdown token. A client
//! close frame, read error or EOF cancels it; so does process shutdown.

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use futures::StreamExt;
use futures::stream::SplitStream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinSet};
use tokio_tungstenite::WebSocketStream;
use tungstenite::Message;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tokio_util::sync::CancellationToken;

use super::session::{PushSession, SessionConfig};
use super::transport::WsTransport;
use crate::core::{PathError, ServeRoot, WatchTarget};

/// Default push endpoint port (the usual livereload port)
pub const DEFAULT_WS_PORT: u16 = 35729;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How long to wait for the peer's close reply after the session ended
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Upper bound on a client sending its upgrade request
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long sessions get to close at shutdown before they are aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Bind the push listener on `host`, trying successive ports when busy.
///
/// Returns the listener and the port actually bound.
pub fn bind(host: &str, base_port: u16) -> Result<(StdTcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match StdTcpListener::bind((host, port)) {
            Ok(listener) => {
                listener.set_nonblocking(true)?;
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        }
    }

    Err(anyhow!(
        "Failed to bind WebSocket server after {} attempts: {}",
        MAX_PORT_RETRIES,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

pub struct Supervisor {
    root: Arc<ServeRoot>,
    config: SessionConfig,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(root: Arc<ServeRoot>, config: SessionConfig, shutdown: CancellationToken) -> Self {
        Self {
            root,
            config,
            shutdown,
        }
    }

    /// Accept connections until shutdown, then wait for every session to close.
    ///
    /// Sessions still running after [`SHUTDOWN_GRACE`] are aborted.
    ///
    /// `listener` must be non-blocking (as returned by [`bind`]).
    pub async fn run(self, listener: StdTcpListener) -> Result<()> {
        let listener = TcpListener::from_std(listener)?;
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => reap(joined),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        crate::debug!("ws"; "client connected: {}", peer);
                        sessions.spawn(handle_connection(
                            stream,
                            peer,
                            Arc::clone(&self.root),
                            self.config,
                            self.shutdown.child_token(),
                        ));
                    }
                    Err(e) => {
                        crate::log!("ws"; "accept error: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        crate::debug!("ws"; "closing {} session(s)", sessions.len());
        if tokio::time::timeout(SHUTDOWN_GRACE, drain(&mut sessions)).await.is_err() {
            crate::log!("ws"; "aborting {} stalled session(s)", sessions.len());
            sessions.abort_all();
            drain(&mut sessions).await;
        }
        Ok(())
    }
}

async fn drain(sessions: &mut JoinSet<()>) {
    while let Some(joined) = sessions.join_next().await {
        reap(joined);
    }
}

fn reap(joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined
        && e.is_panic()
    {
        crate::log!("error"; "session panicked: {}", e);
    }
}

/// Handshake, bind the target, run the session.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    root: Arc<ServeRoot>,
    config: SessionConfig,
    connection: CancellationToken,
) {
    let mut bound: Option<WatchTarget> = None;

    let check_path = |request: &Request, response: Response| {
        match root.resolve_socket(request.uri().path()) {
            Ok(target) => {
                bound = Some(target);
                Ok(response)
            }
            Err(e) => {
                crate::log!("ws"; "{} rejected: {}", peer, e);
                Err(reject(&e))
            }
        }
    };

    let handshake = tokio_tungstenite::accept_hdr_async(stream, check_path);
    let ws = tokio::select! {
        _ = connection.cancelled() => return,
        result = tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake) => match result {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                crate::debug!("ws"; "handshake with {} failed: {}", peer, e);
                return;
            }
            Err(_) => {
                crate::debug!("ws"; "handshake with {} timed out", peer);
                return;
            }
        },
    };
    let Some(target) = bound else {
        return;
    };

    crate::log!("ws"; "{} watching {}", peer, root.relative(&target));

    let (sink, stream) = ws.split();
    let watcher = tokio::spawn(watch_disconnect(stream, connection.clone()));

    // Errors are logged by the session itself
    let _ = PushSession::new(WsTransport::new(sink), target, config)
        .run(&connection)
        .await;

    let abort = watcher.abort_handle();
    if tokio::time::timeout(CLOSE_GRACE, watcher).await.is_err() {
        abort.abort();
    }
    crate::debug!("ws"; "client disconnected: {}", peer);
}

/// HTTP answer to a rejected upgrade request.
fn reject(err: &PathError) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(err.to_string()));
    *response.status_mut() = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::FORBIDDEN);
    response
}

/// Read the client half until it closes, then cancel the session.
///
/// Inbound data messages carry no meaning and are dropped.
async fn watch_disconnect<S>(mut stream: SplitStream<WebSocketStream<S>>, session: CancellationToken)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                crate::debug!("ws"; "read error: {}", e);
                break;
            }
        }
    }
    session.cancel();
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::{MaybeTlsStream, connect_async};

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    struct Harness {
        temp: TempDir,
        port: u16,
        shutdown: CancellationToken,
        handle: JoinHandle<Result<()>>,
    }

    fn start() -> Harness {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("doc.md"), "# Hello").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "plain").unwrap();

        let root = Arc::new(ServeRoot::new(temp.path()).unwrap());
        let (listener, port) = bind("127.0.0.1", 0).unwrap();
        let shutdown = CancellationToken::new();
        let config = SessionConfig {
            debounce: Duration::from_millis(50),
            ..SessionConfig::default()
        };

        let supervisor = Supervisor::new(root, config, shutdown.clone());
        let handle = tokio::spawn(supervisor.run(listener));

        Harness {
            temp,
            port,
            shutdown,
            handle,
        }
    }

    async fn connect(port: u16, path: &str) -> tungstenite::Result<Client> {
        let url = format!("ws://127.0.0.1:{port}{path}");
        connect_async(url).await.map(|(ws, _)| ws)
    }

    async fn next_text(client: &mut Client) -> String {
        let msg = timeout(WAIT, client.next()).await.unwrap().unwrap().unwrap();
        msg.into_text().unwrap().as_str().to_owned()
    }

    fn rejected_status(result: tungstenite::Result<Client>) -> u16 {
        match result {
            Err(tungstenite::Error::Http(response)) => response.status().as_u16(),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("connection should be rejected"),
        }
    }

    #[test]
    fn test_bind_retries_busy_port() {
        let (first, port) = bind("127.0.0.1", 0).unwrap();
        let (_second, next) = bind("127.0.0.1", port).unwrap();
        assert_ne!(port, next);
        drop(first);
    }

    #[tokio::test]
    async fn test_initial_render_and_update() {
        let h = start();
        let mut client = connect(h.port, "/doc.md/ws").await.unwrap();

        assert_eq!(next_text(&mut client).await, "<h1 id=\"hello\">Hello</h1>\n");

        std::fs::write(h.temp.path().join("doc.md"), "# Updated").unwrap();
        assert!(next_text(&mut client).await.contains("Updated"));

        h.shutdown.cancel();
        timeout(WAIT, h.handle).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions_normally() {
        let h = start();
        let mut client = connect(h.port, "/doc.md/ws").await.unwrap();
        next_text(&mut client).await;

        h.shutdown.cancel();

        let msg = timeout(WAIT, client.next()).await.unwrap().unwrap().unwrap();
        match msg {
            Message::Close(Some(frame)) => assert_eq!(frame.code, CloseCode::Normal),
            other => panic!("expected close frame, got {other:?}"),
        }
        timeout(WAIT, h.handle).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_two_clients_same_document() {
        let h = start();
        let mut a = connect(h.port, "/doc.md/ws").await.unwrap();
        let mut b = connect(h.port, "/doc.md/ws").await.unwrap();
        next_text(&mut a).await;
        next_text(&mut b).await;

        // One client leaving does not affect the other
        a.close(None).await.unwrap();

        std::fs::write(h.temp.path().join("doc.md"), "# Again").unwrap();
        assert!(next_text(&mut b).await.contains("Again"));

        h.shutdown.cancel();
        timeout(WAIT, h.handle).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_client_close_is_acknowledged() {
        let h = start();
        let mut client = connect(h.port, "/doc.md/ws").await.unwrap();
        next_text(&mut client).await;

        client.close(None).await.unwrap();
        let next = timeout(WAIT, client.next()).await.unwrap();
        assert!(!matches!(next, Some(Ok(Message::Text(_)))));

        h.shutdown.cancel();
        timeout(WAIT, h.handle).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_rejects_traversal_before_binding() {
        let h = start();

        let status = rejected_status(connect(h.port, "/%2e%2e/%2e%2e/etc/passwd.md/ws").await);
        assert_eq!(status, 403);

        let status = rejected_status(connect(h.port, "/..%5cdoc.md/ws").await);
        assert_eq!(status, 403);

        h.shutdown.cancel();
        timeout(WAIT, h.handle).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_panicked_session_is_reaped() {
        let mut sessions = JoinSet::new();
        sessions.spawn(async { panic!("session bug") });
        sessions.spawn(async {});

        drain(&mut sessions).await;
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_with_silent_client() {
        let h = start();

        // TCP connected, upgrade request never sent
        let _silent = TcpStream::connect(("127.0.0.1", h.port)).await.unwrap();
        // Other clients are still served
        let mut client = connect(h.port, "/doc.md/ws").await.unwrap();
        assert!(next_text(&mut client).await.contains("Hello"));

        h.shutdown.cancel();
        timeout(WAIT, h.handle).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_rejects_missing_and_non_markdown() {
        let h = start();

        assert_eq!(rejected_status(connect(h.port, "/missing.md/ws").await), 404);
        assert_eq!(rejected_status(connect(h.port, "/notes.txt/ws").await), 404);
        assert_eq!(rejected_status(connect(h.port, "/doc.md").await), 404);

        h.shutdown.cancel();
        timeout(WAIT, h.handle).await.unwrap().unwrap().unwrap();
    }
}

//! Push Session
//!
//! Owns one client connection: on every coalesced signal it re-reads the
//! document, renders it and sends the result. Bounded by a hard deadline
//! layered under the caller's cancellation token.
//!
//! Exit paths and what the peer sees:
//!
//! | Exit                          | Result                  | Close |
//! |-------------------------------|-------------------------|-------|
//! | caller cancelled / disconnect | `Ok(())`                | 1000  |
//! | deadline passed               | `Ok(())`                | 1000  |
//! | notifier failed to start      | `Notifier`              | 1011  |
//! | signal source closed early    | `UnexpectedClosure`     | 1011  |
//! | too many read failures        | `Read`                  | 1011  |
//! | send failed                   | `Transport`             | 1011  |

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::notifier::{self, DEFAULT_DEBOUNCE, NotifierError, SignalSource};
use super::transport::{CloseStatus, Transport, TransportError};
use crate::core::WatchTarget;
use crate::render;

/// Default hard session lifetime.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(600);

/// Default number of consecutive read failures tolerated.
pub const DEFAULT_MAX_READ_FAILURES: u32 = 3;

/// Upper bound on sending the close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start change notifier")]
    Notifier(#[from] NotifierError),

    #[error("change notifier stopped unexpectedly")]
    UnexpectedClosure {
        #[source]
        reason: Option<NotifierError>,
    },

    #[error("failed to read `{path}` ({attempts} attempts in a row)")]
    Read {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to push update")]
    Transport(#[from] TransportError),
}

/// Per-session tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub debounce: Duration,
    pub timeout: Duration,
    pub max_read_failures: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            timeout: DEFAULT_SESSION_TIMEOUT,
            max_read_failures: DEFAULT_MAX_READ_FAILURES,
        }
    }
}

/// Why the push loop stopped without an error
enum Exit {
    Cancelled,
    SourceClosed,
}

/// Consecutive read failure counter.
#[derive(Debug)]
struct ReadFailures {
    count: u32,
    limit: u32,
}

impl ReadFailures {
    fn new(limit: u32) -> Self {
        Self { count: 0, limit }
    }

    /// Count a failure. Returns true once the limit is reached.
    fn record(&mut self) -> bool {
        self.count += 1;
        self.count >= self.limit
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

pub struct PushSession<T> {
    transport: T,
    target: WatchTarget,
    config: SessionConfig,
}

impl<T: Transport> PushSession<T> {
    pub fn new(transport: T, target: WatchTarget, config: SessionConfig) -> Self {
        Self {
            transport,
            target,
            config,
        }
    }

    /// Run until cancelled, timed out, or failed.
    ///
    /// Always closes the transport exactly once and stops the notifier
    /// before returning.
    pub async fn run(mut self, cancel: &CancellationToken) -> Result<(), SessionError> {
        let session = cancel.child_token();
        let _guard = session.clone().drop_guard();

        crate::debug!("session"; "start {}", self.target);
        let result = self.serve(&session).await;

        let status = match &result {
            Ok(()) => CloseStatus::Normal,
            Err(_) => CloseStatus::InternalError,
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, self.transport.close(status))
            .await
            .is_err()
        {
            crate::debug!("session"; "close timed out: {}", self.target);
        }

        match &result {
            Ok(()) => crate::debug!("session"; "end {}", self.target),
            Err(e) => crate::log!("session"; "{}: {}", self.target, error_chain(e)),
        }
        result
    }

    async fn serve(&mut self, session: &CancellationToken) -> Result<(), SessionError> {
        let mut signals = notifier::open(&self.target, session.clone(), self.config.debounce)?;

        let exit = self.push_loop(session, &mut signals).await;

        // Stop the notifier on every path and wait for its watch to be released
        session.cancel();
        let stopped = signals.finish().await;

        match exit? {
            Exit::Cancelled => Ok(()),
            Exit::SourceClosed => Err(SessionError::UnexpectedClosure {
                reason: stopped.err(),
            }),
        }
    }

    async fn push_loop(
        &mut self,
        session: &CancellationToken,
        signals: &mut SignalSource,
    ) -> Result<Exit, SessionError> {
        let deadline = tokio::time::sleep(self.config.timeout);
        tokio::pin!(deadline);

        let mut failures = ReadFailures::new(self.config.max_read_failures);

        loop {
            tokio::select! {
                biased;
                _ = session.cancelled() => return Ok(Exit::Cancelled),
                _ = &mut deadline => {
                    crate::debug!("session"; "deadline reached: {}", self.target);
                    return Ok(Exit::Cancelled);
                }
                signal = signals.recv() => match signal {
                    // A stalled send must not outlive cancellation or the deadline
                    Some(()) => tokio::select! {
                        biased;
                        _ = session.cancelled() => return Ok(Exit::Cancelled),
                        _ = &mut deadline => {
                            crate::debug!("session"; "deadline reached mid-push: {}", self.target);
                            return Ok(Exit::Cancelled);
                        }
                        pushed = self.push(&mut failures) => pushed?,
                    },
                    None if session.is_cancelled() => return Ok(Exit::Cancelled),
                    None => return Ok(Exit::SourceClosed),
                },
            }
        }
    }

    /// One read-render-send cycle.
    async fn push(&mut self, failures: &mut ReadFailures) -> Result<(), SessionError> {
        let bytes = match tokio::fs::read(self.target.path()).await {
            Ok(bytes) => {
                failures.reset();
                bytes
            }
            Err(source) => {
                if failures.record() {
                    return Err(SessionError::Read {
                        path: self.target.path().to_path_buf(),
                        attempts: failures.count,
                        source,
                    });
                }
                crate::log!("session"; "read failed, skipping ({}/{}): {}: {}",
                    failures.count, failures.limit, self.target, source);
                return Ok(());
            }
        };

        let html = match render::render(&bytes) {
            Ok(html) => html,
            Err(e) => {
                crate::log!("render"; "{}: {}", self.target, e);
                return Ok(());
            }
        };

        let len = html.len();
        self.transport.send(html).await?;
        crate::debug!("session"; "pushed {} bytes: {}", len, self.target);
        Ok(())
    }
}

/// `outer: inner: root` rendering of an error and its sources.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        out.push_str(": ");
        out.push_str(&e.to_string());
        source = e.source();
    }
    out
}

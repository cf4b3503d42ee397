//! Push transport: the outbound half of one browser connection.
//!
//! A session only ever sends whole rendered documents and closes once.
//! The inbound half is owned by the supervisor's disconnect watcher.

use std::future::Future;

use futures::SinkExt;
use futures::stream::SplitSink;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tungstenite::Message;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

/// How a session ended, as reported to the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStatus {
    /// Cancelled, timed out, or notifier stopped cleanly (1000)
    Normal,
    /// Session failed (1011)
    InternalError,
}

impl CloseStatus {
    pub fn code(self) -> CloseCode {
        match self {
            Self::Normal => CloseCode::Normal,
            Self::InternalError => CloseCode::Error,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket send failed")]
    Send(#[from] tungstenite::Error),

    #[error("connection already closed")]
    Closed,
}

/// Ordered, reliable delivery of rendered documents to one peer.
///
/// `close` must be idempotent: only the first call reaches the peer.
pub trait Transport: Send {
    fn send(&mut self, html: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn close(&mut self, status: CloseStatus) -> impl Future<Output = ()> + Send;
}

/// WebSocket transport over the write half of a split stream.
pub struct WsTransport<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    closed: bool,
}

impl<S> WsTransport<S> {
    pub fn new(sink: SplitSink<WebSocketStream<S>, Message>) -> Self {
        Self {
            sink,
            closed: false,
        }
    }
}

impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, html: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sink.send(Message::Text(html.into())).await?;
        Ok(())
    }

    async fn close(&mut self, status: CloseStatus) {
        if std::mem::replace(&mut self.closed, true) {
            return;
        }
        let frame = CloseFrame {
            code: status.code(),
            reason: String::new().into(),
        };
        // Peer may already be gone
        if let Err(e) = self.sink.send(Message::Close(Some(frame))).await {
            crate::debug!("ws"; "close frame not delivered: {}", e);
        }
    }
}

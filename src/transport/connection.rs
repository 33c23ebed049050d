//! WebSocket connection and event loop.
//!
//! This module owns the socket to the browser. One spawned task per
//! connection reads frames in socket order and performs every write.
//!
//! # Event Loop
//!
//! The loop `select!`s over two sources:
//!
//! - Incoming text frames, handed to the [`FrameHandler`] in order
//! - Outgoing commands from any number of callers, written one at a time
//!
//! It ends on remote close, on any read or write failure, on
//! [`Connection::shutdown`], or once every [`Connection`] handle is
//! dropped. On every exit except the last the handler's
//! [`on_close`](FrameHandler::on_close) runs exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Weak;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Client socket as produced by [`connect`].
pub type ClientStream = MaybeTlsStream<TcpStream>;

// ============================================================================
// FrameHandler
// ============================================================================

/// Receives what the event loop reads.
///
/// Both methods run on the event-loop task and must not block.
pub trait FrameHandler: Send + Sync + 'static {
    /// Called for every inbound text frame, in socket order.
    fn on_text(&self, text: &str);

    /// Called once after the loop stopped reading.
    fn on_close(&self);
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write a text frame.
    Send(String),
    /// Close the socket and stop.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Write handle to a WebSocket connection.
///
/// Cheap to clone. Sends are queued to the event loop and never wait for
/// the socket.
#[derive(Debug, Clone)]
pub struct Connection {
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl Connection {
    /// Wraps an established WebSocket.
    ///
    /// The returned [`EventLoop`] must be spawned for frames to flow.
    pub fn new<S>(ws_stream: WebSocketStream<S>) -> (Self, EventLoop<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        (
            Self { command_tx },
            EventLoop {
                ws_stream,
                command_rx,
            },
        )
    }

    /// Queues a text frame for writing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the event loop has stopped.
    pub fn send(&self, text: String) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Send(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Asks the event loop to close the socket.
    ///
    /// Frames queued before this call are written first.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }
}

// ============================================================================
// connect
// ============================================================================

/// Opens a client WebSocket to `url`.
///
/// # Errors
///
/// - [`Error::ConnectionTimeout`] if the handshake exceeds `handshake_timeout`
/// - [`Error::Connection`] if the handshake fails
pub async fn connect(
    url: &Url,
    handshake_timeout: Duration,
) -> Result<(Connection, EventLoop<ClientStream>)> {
    let (ws_stream, response) = timeout(handshake_timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| Error::connection_timeout(handshake_timeout.as_millis() as u64))?
        .map_err(|e| Error::connection(format!("WebSocket handshake with {url} failed: {e}")))?;

    debug!(%url, status = %response.status(), "WebSocket connected");

    Ok(Connection::new(ws_stream))
}

// ============================================================================
// EventLoop
// ============================================================================

/// Not-yet-started event loop of a [`Connection`].
pub struct EventLoop<S> {
    ws_stream: WebSocketStream<S>,
    command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
}

impl<S> EventLoop<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Starts the loop on the current runtime.
    ///
    /// The loop holds the handler weakly; frames arriving after the
    /// handler is dropped are discarded.
    pub fn spawn<H: FrameHandler>(self, handler: Weak<H>) -> JoinHandle<()> {
        tokio::spawn(self.run(handler))
    }

    async fn run<H: FrameHandler>(self, handler: Weak<H>) {
        let Self {
            ws_stream,
            mut command_rx,
        } = self;
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let notify_close = loop {
            tokio::select! {
                // Incoming frames from the browser
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(len = text.len(), "Frame received");
                            match handler.upgrade() {
                                Some(handler) => handler.on_text(text.as_str()),
                                None => trace!("Frame discarded, handler gone"),
                            }
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "WebSocket closed by remote");
                            break true;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket read failed");
                            break true;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break true;
                        }

                        // Binary, Ping, Pong, raw frames
                        Some(Ok(_)) => {}
                    }
                }

                // Commands from callers
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(text)) => {
                            if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                error!(error = %e, "WebSocket write failed");
                                break true;
                            }
                            trace!("Frame sent");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            if let Err(e) = ws_write.close().await {
                                warn!(error = %e, "WebSocket close handshake failed");
                            }
                            break true;
                        }

                        None => {
                            debug!("All connection handles dropped");
                            let _ = ws_write.close().await;
                            break false;
                        }
                    }
                }
            }
        };

        // Stop accepting sends before the handler fails what is pending
        command_rx.close();

        if notify_close && let Some(handler) = handler.upgrade() {
            handler.on_close();
        }

        debug!("Event loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================

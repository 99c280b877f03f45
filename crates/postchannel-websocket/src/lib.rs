//! WebSocket transport for post-channel.
//!
//! Each wire message travels as one JSON text frame. A reader task feeds
//! inbound frames into a [`Mailbox`]; outbound messages are queued to a
//! writer task that owns the sink. Frames that are not JSON text are dropped
//! here, and anything that is JSON but not a wire message is dropped by the
//! channel.

use futures_util::{SinkExt, StreamExt};
use postchannel::adapters::Mailbox;
use postchannel::{Endpoint, PostTarget};
use postchannel_core::Message;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as Frame;

/// Error establishing a WebSocket endpoint.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),
}

/// A WebSocket shaped as a post-channel [`Endpoint`].
pub struct WsEndpoint {
    endpoint: Endpoint,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WsEndpoint {
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }

    /// Whether the socket has stopped delivering frames.
    pub fn is_closed(&self) -> bool {
        self.reader.is_finished()
    }

    /// Stop both I/O tasks. Channels built on this endpoint go quiet.
    pub fn close(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl Drop for WsEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}

/// Dial a WebSocket server.
pub async fn connect(url: &str) -> Result<WsEndpoint, WsError> {
    let (ws, _) = tokio_tungstenite::connect_async(url).await?;
    tracing::debug!(url, "websocket connected");
    Ok(from_stream(ws))
}

/// Accept a WebSocket upgrade on an already-accepted TCP stream.
pub async fn accept(stream: TcpStream) -> Result<WsEndpoint, WsError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    Ok(from_stream(ws))
}

/// Wrap an established WebSocket. Must be called within a tokio runtime.
pub fn from_stream<S>(ws: WebSocketStream<S>) -> WsEndpoint
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();
    let inbox = Mailbox::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let reader = {
        let inbox = inbox.clone();
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                };
                match frame {
                    Frame::Text(text) => match serde_json::from_str::<Value>(&text) {
                        Ok(event) => inbox.dispatch(event),
                        Err(e) => tracing::trace!("dropping non-JSON frame: {}", e),
                    },
                    Frame::Close(_) => break,
                    _ => {}
                }
            }
            tracing::debug!("websocket reader finished");
        })
    };

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = sink.send(Frame::Text(text.into())).await {
                tracing::warn!("websocket send failed: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    WsEndpoint {
        endpoint: Endpoint::new(inbox, Arc::new(WsTarget { tx })),
        reader,
        writer,
    }
}

struct WsTarget {
    tx: mpsc::UnboundedSender<String>,
}

impl PostTarget for WsTarget {
    fn post_message(&self, message: &Message) {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("failed to encode message: {}", e);
                return;
            }
        };
        if self.tx.send(text).is_err() {
            tracing::warn!(kind = message_kind(message), "websocket closed, message dropped");
        }
    }
}

fn message_kind(message: &Message) -> &'static str {
    match message {
        Message::Syn(_) => "syn",
        Message::Ack(_) => "ack",
        Message::User(_) => "msg",
    }
}

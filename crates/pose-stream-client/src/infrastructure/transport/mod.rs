//! WebSocket transport.
//!
//! [`WsConnector`] performs the handshake with `tokio-tungstenite` and hands
//! the connection manager a [`TransportLink`]: a pair of channels backed by a
//! socket task.  The socket task owns both halves of the WebSocket and runs
//! until one of these happens:
//!
//! - the server sends a Close frame or the stream ends
//! - a read or write fails
//! - the manager drops the outbound sender (a Close frame is sent first)
//! - the manager stops reading inbound messages
//!
//! Whatever the cause, the inbound channel closes and the manager sees the
//! link as closed.

pub mod mock;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::application::connection_manager::{Connector, TransportError, TransportLink};

/// Outbound buffer.  The gate keeps at most one frame in flight, so a
/// handful of slots covers a frame plus session-context updates.
const OUTBOUND_CAPACITY: usize = 8;
const INBOUND_CAPACITY: usize = 32;

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError> {
        let (ws_stream, response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        debug!("WebSocket handshake with {url} completed ({})", response.status());

        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (inbound_tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
        tokio::spawn(run_socket(ws_stream, outbound_rx, inbound_tx, url.to_string()));

        Ok(TransportLink { outbound, inbound })
    }
}

async fn run_socket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut outbound: mpsc::Receiver<String>,
    inbound: mpsc::Sender<String>,
    url: String,
) {
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            next_out = outbound.recv() => match next_out {
                Some(text) => {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        warn!("WebSocket write to {url} failed: {e}");
                        break;
                    }
                }
                None => {
                    debug!("closing WebSocket to {url}");
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                }
            },

            next_in = stream.next() => match next_in {
                Some(Ok(WsMessage::Text(text))) => {
                    if inbound.send(text).await.is_err() {
                        debug!("link to {url} detached; dropping socket");
                        break;
                    }
                }
                Some(Ok(WsMessage::Binary(data))) => {
                    debug!("ignoring {}-byte binary frame from {url}", data.len());
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    debug!("server closed WebSocket: {frame:?}");
                    break;
                }
                // Ping/Pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    debug!("WebSocket to {url} closed");
                    break;
                }
                Some(Err(e)) => {
                    warn!("WebSocket read from {url} failed: {e}");
                    break;
                }
                None => break,
            },
        }
    }
}

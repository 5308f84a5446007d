//! Transport seam between the session client and the wire.
//!
//! The session loop talks to boxed write/read halves so tests can swap in
//! a scripted transport; production uses tokio-tungstenite underneath.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One inbound unit from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One JSON text message
    Text(String),
    /// Keepalive probe that must be answered on the write half
    Ping(Vec<u8>),
    /// Transport is gone; `normal` is true only for a close frame with a
    /// normal status code
    Closed { normal: bool },
}

/// Write half of a connection
#[async_trait]
pub trait ConnectionWriter: Send {
    /// Send one text frame
    async fn send(&mut self, text: String) -> Result<()>;

    /// Answer a keepalive probe
    async fn pong(&mut self, data: Vec<u8>) -> Result<()>;

    /// Close with a normal status code, best-effort
    async fn close(&mut self);
}

/// Read half of a connection
#[async_trait]
pub trait ConnectionReader: Send {
    /// Next frame from the wire. `Frame::Closed` is terminal; callers stop
    /// reading after receiving it.
    async fn next_frame(&mut self) -> Frame;
}

/// Factory for physical connections
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to `url`, returning write and read halves
    async fn connect(&self, url: &str)
        -> Result<(Box<dyn ConnectionWriter>, Box<dyn ConnectionReader>)>;
}

/// Production transport backed by tokio-tungstenite
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn connect(
        &self,
        url: &str,
    ) -> Result<(Box<dyn ConnectionWriter>, Box<dyn ConnectionReader>)> {
        let (ws_stream, response) = connect_async(url).await?;
        debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = ws_stream.split();
        Ok((
            Box::new(WsWriteHalf { write }),
            Box::new(WsReadHalf { read }),
        ))
    }
}

struct WsWriteHalf {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl ConnectionWriter for WsWriteHalf {
    async fn send(&mut self, text: String) -> Result<()> {
        self.write.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn pong(&mut self, data: Vec<u8>) -> Result<()> {
        self.write.send(Message::Pong(data)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "client disconnect".into(),
        };
        if let Err(e) = self.write.send(Message::Close(Some(frame))).await {
            debug!("Close frame not delivered: {}", e);
        }
    }
}

struct WsReadHalf {
    read: SplitStream<WsStream>,
}

#[async_trait]
impl ConnectionReader for WsReadHalf {
    async fn next_frame(&mut self) -> Frame {
        loop {
            match self.read.next().await {
                Some(Ok(Message::Text(text))) => return Frame::Text(text),
                Some(Ok(Message::Ping(data))) => return Frame::Ping(data),
                Some(Ok(Message::Close(frame))) => {
                    let normal = frame
                        .as_ref()
                        .map(|f| f.code == CloseCode::Normal)
                        .unwrap_or(false);
                    debug!(?frame, normal, "Received close frame");
                    return Frame::Closed { normal };
                }
                Some(Ok(Message::Pong(_))) => {}
                Some(Ok(other)) => {
                    debug!("Ignoring non-text frame: {:?}", other);
                }
                Some(Err(e)) => {
                    warn!("WebSocket read error: {}", e);
                    return Frame::Closed { normal: false };
                }
                None => return Frame::Closed { normal: false },
            }
        }
    }
}

//! The listener: WebSocket endpoint with a plain-HTTP fallback on the
//! same port.
//!
//! Game clients open a WebSocket at `/`; matchmakers and monitoring
//! probe the same port with a plain `GET /` expecting room metadata.
//! The listener reads the request head once, decides which of the two
//! it is, and replays the consumed bytes so the handshake (or the HTTP
//! responder) starts from a clean stream.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::{rustls, TlsAcceptor};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::stream::{MaybeTls, Rewind};
use crate::{ConnectionId, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Request heads larger than this are treated as garbage.
const MAX_HEAD_BYTES: usize = 8 * 1024;

type Stream = Rewind<MaybeTls>;

/// What an accepted socket turned out to be.
pub enum Incoming {
    /// A client completed (or is about to complete) a WebSocket upgrade.
    Socket(WsConnection),
    /// Anything else — answered with the metadata document.
    Http(HttpRequest),
}

/// The server's listen socket, plain or TLS.
pub struct Listener {
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
}

impl Listener {
    /// Binds to `addr`. With a rustls config, every accepted connection
    /// is wrapped in TLS before anything is read.
    pub async fn bind(
        addr: &str,
        tls: Option<Arc<rustls::ServerConfig>>,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(TransportError::Bind)?;
        tracing::info!(addr, tls = tls.is_some(), "listening");
        Ok(Self {
            listener,
            tls: tls.map(TlsAcceptor::from),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts the next connection and classifies it.
    pub async fn accept(&mut self) -> Result<Incoming, TransportError> {
        let (tcp, addr) = self.listener.accept().await.map_err(TransportError::Accept)?;

        let stream = match &self.tls {
            Some(acceptor) => MaybeTls::Tls(Box::new(
                acceptor.accept(tcp).await.map_err(TransportError::Accept)?,
            )),
            None => MaybeTls::Plain(tcp),
        };

        let (head, stream) = read_head(stream).await?;
        if head_requests_upgrade(&head) {
            let ws = tokio_tungstenite::accept_async(stream)
                .await
                .map_err(|e| TransportError::Handshake(e.to_string()))?;
            let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
            tracing::debug!(%id, %addr, "websocket connection accepted");
            Ok(Incoming::Socket(WsConnection { id, addr, ws }))
        } else {
            tracing::debug!(%addr, "plain http request");
            Ok(Incoming::Http(HttpRequest { stream, addr }))
        }
    }
}

/// Reads the request head (through the blank line) without consuming it
/// for good: the bytes come back wrapped in a [`Rewind`].
async fn read_head(mut stream: MaybeTls) -> Result<(String, Stream), TransportError> {
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 512];
    loop {
        let n = stream.read(&mut chunk).await.map_err(TransportError::Receive)?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&chunk[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") || head.len() > MAX_HEAD_BYTES {
            break;
        }
    }
    let text = String::from_utf8_lossy(&head).into_owned();
    Ok((text, Rewind::new(head, stream)))
}

fn head_requests_upgrade(head: &str) -> bool {
    head.lines().any(|line| {
        let Some((name, value)) = line.split_once(':') else {
            return false;
        };
        name.trim().eq_ignore_ascii_case("upgrade")
            && value.to_ascii_lowercase().contains("websocket")
    })
}

/// An upgraded WebSocket connection.
pub struct WsConnection {
    id: ConnectionId,
    addr: SocketAddr,
    ws: WebSocketStream<Stream>,
}

impl WsConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The peer's network address — keys bans and ratelimits, so it must
    /// be the same value for every packet of a connection.
    pub fn peer_ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Splits into independently owned writer and reader halves, so one
    /// task can drain outbound frames while another pumps inbound ones.
    pub fn split(self) -> (WsWriter, WsReader) {
        let (sink, stream) = self.ws.split();
        (
            WsWriter { id: self.id, sink },
            WsReader {
                id: self.id,
                stream,
            },
        )
    }
}

/// Outbound half of a connection.
pub struct WsWriter {
    id: ConnectionId,
    sink: SplitSink<WebSocketStream<Stream>, Message>,
}

impl WsWriter {
    pub async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(send_error)
    }

    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.close().await.map_err(send_error)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Inbound half of a connection.
pub struct WsReader {
    id: ConnectionId,
    stream: SplitStream<WebSocketStream<Stream>>,
}

impl WsReader {
    /// The next text frame, or `None` once the connection is closed.
    /// Binary, ping and pong frames are skipped.
    pub async fn next_text(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::Receive(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )))
                }
            }
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

fn send_error(e: tokio_tungstenite::tungstenite::Error) -> TransportError {
    TransportError::Send(std::io::Error::new(std::io::ErrorKind::BrokenPipe, e))
}

/// A non-WebSocket request, waiting for its one JSON answer.
pub struct HttpRequest {
    stream: Stream,
    addr: SocketAddr,
}

impl HttpRequest {
    pub fn peer_ip(&self) -> IpAddr {
        self.addr.ip()
    }

    /// Writes a `200 OK` JSON response with permissive CORS and closes.
    pub async fn respond_json(mut self, body: &str) -> Result<(), TransportError> {
        let response = format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: application/json\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {body}",
            body.len()
        );
        self.stream
            .write_all(response.as_bytes())
            .await
            .map_err(TransportError::Send)?;
        self.stream.shutdown().await.map_err(TransportError::Send)
    }
}

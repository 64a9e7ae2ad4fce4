//! Transport layer: TCP, TLS, and WebSocket connections.
//!
//! The connection controller treats every variant uniformly as a
//! bidirectional stream of lines. WebSocket text frames may carry
//! multiple newline-delimited lines; they are split here so the rest of
//! the client only ever sees single lines, in arrival order.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::codec::Framed;
use tracing::warn;

use crate::codec::IrcCodec;
use crate::error::ClientError;

/// A connected transport carrying newline-delimited protocol lines.
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    Tcp {
        framed: Framed<TcpStream, IrcCodec>,
    },
    Tls {
        framed: Framed<TlsStream<TcpStream>, IrcCodec>,
    },
    WebSocket {
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        pending: VecDeque<String>,
    },
}

impl Transport {
    /// Open a plain TCP connection.
    pub async fn tcp(host: &str, port: u16) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((host, port)).await?;
        if let Err(e) = enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }
        Ok(Self::Tcp {
            framed: Framed::new(stream, IrcCodec::default()),
        })
    }

    /// Open a TLS connection, verifying the server against the bundled
    /// web PKI roots.
    pub async fn tls(host: &str, port: u16) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((host, port)).await?;
        if let Err(e) = enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));
        let domain = ServerName::try_from(host.to_string())
            .map_err(|_| ClientError::InvalidServerName(host.to_string()))?;

        let stream = connector.connect(domain, stream).await?;
        Ok(Self::Tls {
            framed: Framed::new(stream, IrcCodec::default()),
        })
    }

    /// Open a WebSocket connection (`ws://` or `wss://`).
    pub async fn websocket(url: &str) -> Result<Self, ClientError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        Ok(Self::WebSocket {
            stream,
            pending: VecDeque::new(),
        })
    }

    /// Next line from the server, or `None` once the peer has closed.
    pub async fn next_line(&mut self) -> Result<Option<String>, ClientError> {
        match self {
            Self::Tcp { framed } => framed.next().await.transpose(),
            Self::Tls { framed } => framed.next().await.transpose(),
            Self::WebSocket { stream, pending } => loop {
                if let Some(line) = pending.pop_front() {
                    return Ok(Some(line));
                }

                match stream.next().await {
                    Some(Ok(WsMessage::Text(text))) => {
                        for line in text.lines() {
                            if !line.is_empty() {
                                pending.push_back(line.to_string());
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return Ok(None),
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
                    Some(Ok(WsMessage::Binary(_))) => {
                        warn!("ignoring binary WebSocket frame (protocol is text-only)");
                        continue;
                    }
                    Some(Ok(WsMessage::Frame(_))) => continue,
                    Some(Err(e)) => return Err(ClientError::WebSocket(e)),
                }
            },
        }
    }

    /// Send one line, framing it as the transport requires.
    pub async fn send_line(&mut self, line: &str) -> Result<(), ClientError> {
        match self {
            Self::Tcp { framed } => framed.send(line.to_string()).await,
            Self::Tls { framed } => framed.send(line.to_string()).await,
            Self::WebSocket { stream, .. } => stream
                .send(WsMessage::Text(line.to_string()))
                .await
                .map_err(ClientError::WebSocket),
        }
    }
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    use socket2::{SockRef, TcpKeepalive};
    use std::time::Duration;

    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));

    sock.set_tcp_keepalive(&keepalive)
}

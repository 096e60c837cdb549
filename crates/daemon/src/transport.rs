// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport for the command session.
//!
//! Provides:
//! - connection setup carrying the `jwt` cookie
//! - the writer role, which frames outbound messages
//! - the reader role, which classifies inbound frames and watches liveness
//! - the keepalive tuner, which adapts TCP keepalive to the device mode
//!
//! The roles are generic over `Sink`/`Stream` so tests can drive them with
//! in-memory channels.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Data, OpCode};
use tokio_tungstenite::tungstenite::protocol::frame::Frame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uplink_core::{split_frames, FrameKind};

use crate::device::DeviceState;
use crate::session::Session;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection or handshake did not finish in time.
    #[error("connection timed out")]
    Timeout,

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The URL could not be turned into a request.
    #[error("invalid url {0}")]
    InvalidUrl(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A client WebSocket over plain or TLS TCP.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An established WebSocket plus a handle on its TCP socket.
pub struct Connection {
    pub ws: WsStream,
    /// Duplicate of the socket, used to tune keepalive options.
    pub socket: Option<std::net::TcpStream>,
}

/// Opens a WebSocket to `url`, sending `jwt=<token>` as a cookie.
pub async fn connect(url: &str, token: &str, timeout: Duration) -> TransportResult<Connection> {
    let mut request = url
        .into_client_request()
        .map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;
    let cookie = HeaderValue::from_str(&format!("jwt={token}"))
        .map_err(|e| TransportError::ConnectionFailed(format!("invalid token: {e}")))?;
    request.headers_mut().insert(COOKIE, cookie);

    let uri = request.uri();
    let host = uri
        .host()
        .ok_or_else(|| TransportError::InvalidUrl(url.to_string()))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
        Some("wss") | Some("https") => 443,
        _ => 80,
    });

    let tcp = tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), port)))
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    tcp.set_nodelay(true)
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    let (tcp, socket) = split_keepalive_handle(tcp)?;

    let (ws, _) = tokio::time::timeout(timeout, tokio_tungstenite::client_async_tls(request, tcp))
        .await
        .map_err(|_| TransportError::Timeout)?
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

    Ok(Connection { ws, socket })
}

fn split_keepalive_handle(
    tcp: TcpStream,
) -> TransportResult<(TcpStream, Option<std::net::TcpStream>)> {
    let std_stream = tcp
        .into_std()
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    let handle = match std_stream.try_clone() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "cannot duplicate socket, keepalive tuning disabled");
            None
        }
    };
    let tcp = TcpStream::from_std(std_stream)
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    Ok((tcp, handle))
}

/// Sends `payload` as one fragmented text message of frames no larger than
/// `frame_size`.
pub async fn send_framed<S>(sink: &mut S, payload: &[u8], frame_size: usize) -> TransportResult<()>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let chunks =
        split_frames(payload, frame_size).map_err(|e| TransportError::SendFailed(e.to_string()))?;
    for chunk in chunks {
        let opcode = match chunk.kind {
            FrameKind::Text => OpCode::Data(Data::Text),
            FrameKind::Continuation => OpCode::Data(Data::Continue),
        };
        let frame = Frame::message(Bytes::copy_from_slice(chunk.payload), opcode, chunk.is_final);
        sink.feed(Message::Frame(frame))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
    }
    sink.flush()
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))
}

/// Writer role: drains the outbound tiers until the session ends.
pub async fn run_writer<S>(mut sink: S, session: &Session, frame_size: usize, poll: Duration)
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    while !session.is_terminated() {
        let next = tokio::select! {
            _ = session.token().cancelled() => break,
            next = session.outbound.next(poll) => next,
        };
        let Some(message) = next else {
            continue;
        };
        if let Err(e) = send_framed(&mut sink, message.as_bytes(), frame_size).await {
            warn!(error = %e, "write failed, ending session");
            session.terminate();
            break;
        }
    }
    let _ = sink.close().await;
    debug!("writer stopped");
}

/// What the reader did with one message.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadEvent {
    /// A text payload for the dispatcher.
    Inbound(String),
    /// A liveness signal.
    Alive,
    /// Nothing to do.
    Ignored,
    /// The peer closed the session.
    Closed,
}

/// Classifies one inbound WebSocket message.
pub fn classify_message(message: Message) -> ReadEvent {
    match message {
        Message::Text(text) => ReadEvent::Inbound(text.to_string()),
        Message::Binary(data) => match String::from_utf8(data.to_vec()) {
            Ok(text) => ReadEvent::Inbound(text),
            Err(e) => {
                warn!(error = %e, len = data.len(), "dropping undecodable binary frame");
                ReadEvent::Ignored
            }
        },
        Message::Ping(_) | Message::Pong(_) => ReadEvent::Alive,
        Message::Close(frame) => {
            info!(?frame, "server closed session");
            ReadEvent::Closed
        }
        Message::Frame(_) => ReadEvent::Ignored,
    }
}

/// Reader role: feeds the inbound queue and ends the session on close,
/// error, end of stream or prolonged silence.
pub async fn run_reader<S>(mut stream: S, session: &Session, poll: Duration, silence_limit: Duration)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while !session.is_terminated() {
        let read = tokio::select! {
            _ = session.token().cancelled() => break,
            read = tokio::time::timeout(poll, stream.next()) => read,
        };
        match read {
            Err(_) => {
                let silent = session.silent_for();
                if silent > silence_limit {
                    warn!(silent_secs = silent.as_secs(), "no ping from server, ending session");
                    session.terminate();
                }
            }
            Ok(None) => {
                info!("session stream ended");
                session.terminate();
            }
            Ok(Some(Err(e))) => {
                warn!(error = %e, "read failed, ending session");
                session.terminate();
            }
            Ok(Some(Ok(message))) => match classify_message(message) {
                ReadEvent::Inbound(text) => {
                    debug!(len = text.len(), "inbound message");
                    session.inbound.push(text);
                }
                ReadEvent::Alive => session.touch(),
                ReadEvent::Ignored => {}
                ReadEvent::Closed => session.terminate(),
            },
        }
    }
    debug!("reader stopped");
}

/// TCP keepalive settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveParams {
    pub user_timeout_ms: u32,
    pub idle_secs: u32,
    pub interval_secs: u32,
    pub count: u32,
}

/// Keepalive while the device is in active use: detect dead links fast.
pub const ACTIVE_KEEPALIVE: KeepaliveParams = KeepaliveParams {
    user_timeout_ms: 16_000,
    idle_secs: 7,
    interval_secs: 7,
    count: 2,
};

/// Keepalive while the device is idle.
pub const IDLE_KEEPALIVE: KeepaliveParams = KeepaliveParams {
    user_timeout_ms: 0,
    idle_secs: 30,
    interval_secs: 10,
    count: 3,
};

pub fn keepalive_for(active: bool) -> KeepaliveParams {
    if active {
        ACTIVE_KEEPALIVE
    } else {
        IDLE_KEEPALIVE
    }
}

/// Tracks the applied mode so options are only set on a change.
#[derive(Debug, Default)]
pub struct KeepaliveTuner {
    applied: Option<bool>,
}

impl KeepaliveTuner {
    /// Returns the parameters to apply for `active`, if the mode changed.
    pub fn check(&mut self, active: bool) -> Option<KeepaliveParams> {
        if self.applied == Some(active) {
            return None;
        }
        self.applied = Some(active);
        Some(keepalive_for(active))
    }
}

/// Sets keepalive options on `socket`.
#[cfg(target_os = "linux")]
pub fn apply_keepalive(socket: &std::net::TcpStream, params: KeepaliveParams) -> std::io::Result<()> {
    use nix::sys::socket::{setsockopt, sockopt};

    setsockopt(socket, sockopt::TcpUserTimeout, &params.user_timeout_ms)?;
    setsockopt(socket, sockopt::KeepAlive, &true)?;
    setsockopt(socket, sockopt::TcpKeepIdle, &params.idle_secs)?;
    setsockopt(socket, sockopt::TcpKeepInterval, &params.interval_secs)?;
    setsockopt(socket, sockopt::TcpKeepCount, &params.count)?;
    Ok(())
}

/// Sets keepalive options on `socket`.
#[cfg(not(target_os = "linux"))]
pub fn apply_keepalive(_socket: &std::net::TcpStream, _params: KeepaliveParams) -> std::io::Result<()> {
    Ok(())
}

/// Keepalive role: re-checks the device mode every `interval`.
pub async fn run_keepalive(
    socket: Option<std::net::TcpStream>,
    device: Arc<dyn DeviceState>,
    token: CancellationToken,
    interval: Duration,
) {
    let mut tuner = KeepaliveTuner::default();
    loop {
        let active = device.is_active();
        if let Some(params) = tuner.check(active) {
            match socket.as_ref().map(|s| apply_keepalive(s, params)) {
                Some(Ok(())) => debug!(active, ?params, "keepalive updated"),
                Some(Err(e)) => warn!(error = %e, "failed to set keepalive"),
                None => {}
            }
        }
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!("keepalive tuner stopped");
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Local port tunnel.
//!
//! `startLocalProxy` bridges a fresh WebSocket to a TCP port on the loopback
//! interface. Two roles pump bytes, one per direction, under a proxy token
//! nested in the session token.

use std::time::Duration;

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{AuthError, TokenProvider};
use crate::transport::{self, TransportError};

/// Read buffer size of the local side.
const LOCAL_READ_SIZE: usize = 4096;

/// Error type for tunnel setup.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("Requested local port {0} not whitelisted")]
    PortNotAllowed(u16),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("remote connection failed: {0}")]
    Remote(#[from] TransportError),

    #[error("local connection to port {port} failed: {source}")]
    Local {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for tunnel setup.
pub type TunnelResult<T> = Result<T, TunnelError>;

/// A running tunnel.
pub struct TunnelHandle {
    /// Cancelled when either direction ends.
    pub token: CancellationToken,
    pub remote_to_local: JoinHandle<()>,
    pub local_to_remote: JoinHandle<()>,
}

/// Settings of one tunnel request.
#[derive(Debug, Clone)]
pub struct TunnelRequest<'a> {
    pub remote_ws_uri: &'a str,
    pub local_port: u16,
    pub allowed_ports: &'a [u16],
    pub connect_timeout: Duration,
}

/// Opens both ends and spawns the two roles.
pub async fn start_local_proxy(
    request: TunnelRequest<'_>,
    tokens: &dyn TokenProvider,
    session: &CancellationToken,
) -> TunnelResult<TunnelHandle> {
    let port = request.local_port;
    if !request.allowed_ports.contains(&port) {
        return Err(TunnelError::PortNotAllowed(port));
    }

    info!(port, "starting local proxy");
    let token = tokens.token().await?;
    let remote = transport::connect(request.remote_ws_uri, &token, request.connect_timeout).await?;
    let local = TcpStream::connect(("127.0.0.1", port))
        .await
        .map_err(|source| TunnelError::Local { port, source })?;

    let proxy = session.child_token();
    let (sink, stream) = remote.ws.split();
    let (local_read, local_write) = local.into_split();

    let remote_to_local = tokio::spawn(run_remote_to_local(
        stream,
        local_write,
        proxy.clone(),
        session.clone(),
    ));
    let local_to_remote = tokio::spawn(run_local_to_remote(local_read, sink, proxy.clone()));
    info!(port, "local proxy started");

    Ok(TunnelHandle {
        token: proxy,
        remote_to_local,
        local_to_remote,
    })
}

/// Forwards remote frames to the local socket.
///
/// A remote close or any fault also ends the session that opened the tunnel.
pub async fn run_remote_to_local<S, W>(
    mut stream: S,
    mut local: W,
    proxy: CancellationToken,
    session: CancellationToken,
) where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
    W: AsyncWrite + Unpin,
{
    let faulted = loop {
        let next = tokio::select! {
            biased;
            _ = proxy.cancelled() => break false,
            next = stream.next() => next,
        };
        let data = match next {
            Some(Ok(Message::Text(text))) => Bytes::copy_from_slice(text.as_bytes()),
            Some(Ok(Message::Binary(data))) => data,
            Some(Ok(Message::Close(_))) | None => {
                debug!("tunnel remote closed");
                break true;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(error = %e, "tunnel remote read failed");
                break true;
            }
        };
        if let Err(e) = local.write_all(&data).await {
            warn!(error = %e, "tunnel local write failed");
            break true;
        }
    };

    let _ = local.shutdown().await;
    proxy.cancel();
    if faulted {
        session.cancel();
    }
    debug!("tunnel remote to local stopped");
}

/// Forwards local bytes to the remote as binary frames.
pub async fn run_local_to_remote<R, S>(mut local: R, mut sink: S, proxy: CancellationToken)
where
    R: AsyncRead + Unpin,
    S: Sink<Message, Error = WsError> + Unpin,
{
    let mut buf = vec![0u8; LOCAL_READ_SIZE];
    loop {
        let read = tokio::select! {
            _ = proxy.cancelled() => break,
            read = local.read(&mut buf) => read,
        };
        match read {
            Ok(0) => {
                debug!("tunnel local closed");
                break;
            }
            Ok(n) => {
                let frame = Message::Binary(Bytes::copy_from_slice(&buf[..n]));
                if let Err(e) = sink.send(frame).await {
                    warn!(error = %e, "tunnel remote write failed");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "tunnel local read failed");
                break;
            }
        }
    }

    proxy.cancel();
    let _ = sink.close().await;
    debug!("tunnel local to remote stopped");
}

#[cfg(test)]
#[path = "tunnel_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for local port tunnelling through a running agent.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;
use common::*;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn tunnel_carries_bytes_both_ways() {
    let session_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let tunnel_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let local_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = format!("ws://{}", session_listener.local_addr().unwrap());
    let tunnel_uri = format!("ws://{}/tunnel/abc", tunnel_listener.local_addr().unwrap());
    let local_port = local_listener.local_addr().unwrap().port();

    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), &format!("local_port_allowlist = [{local_port}]"));
    let _agent = AgentProcess::spawn(dir.path(), &host);
    let (mut session, _, _) = accept_session(&session_listener).await;

    let request = json!({
        "jsonrpc": "2.0",
        "method": "startLocalProxy",
        "params": {"remote_ws_uri": tunnel_uri, "local_port": local_port},
        "id": 1
    });
    session
        .send(Message::Text(request.to_string().into()))
        .await
        .unwrap();

    let (mut tunnel, path, cookie) = accept_session(&tunnel_listener).await;
    assert_eq!(path, "/tunnel/abc");
    assert_eq!(cookie.as_deref(), Some("jwt=secret-token"));
    let (mut local, _) = tokio::time::timeout(WAIT, local_listener.accept())
        .await
        .unwrap()
        .unwrap();

    let reply = loop {
        match tokio::time::timeout(WAIT, session.next()).await.unwrap().unwrap().unwrap() {
            Message::Text(text) => break serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            _ => continue,
        }
    };
    assert_eq!(reply, json!({"jsonrpc": "2.0", "result": {"success": 1}, "id": 1}));

    tunnel
        .send(Message::Binary(b"ssh-hello".to_vec().into()))
        .await
        .unwrap();
    let mut buf = [0u8; 9];
    tokio::time::timeout(WAIT, local.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&buf, b"ssh-hello");

    local.write_all(b"banner").await.unwrap();
    let echoed = loop {
        match tokio::time::timeout(WAIT, tunnel.next()).await.unwrap().unwrap().unwrap() {
            Message::Binary(data) => break data,
            _ => continue,
        }
    };
    assert_eq!(&echoed[..], b"banner");

    // Closing the local side ends the tunnel but leaves the session up.
    drop(local);
    let closed = tokio::time::timeout(WAIT, async {
        loop {
            match tunnel.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    let reply = call(&mut session, json!({"jsonrpc": "2.0", "method": "echo", "params": ["still here"], "id": 2})).await;
    assert_eq!(reply["result"], "still here");
}

#[tokio::test]
async fn tunnel_to_disallowed_port_is_refused() {
    let session_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = format!("ws://{}", session_listener.local_addr().unwrap());
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), "local_port_allowlist = [8022]");
    let _agent = AgentProcess::spawn(dir.path(), &host);
    let (mut session, _, _) = accept_session(&session_listener).await;

    let reply = call(
        &mut session,
        json!({"jsonrpc": "2.0", "method": "startLocalProxy", "params": ["ws://127.0.0.1:1/t", 9999], "id": 1}),
    )
    .await;
    assert_eq!(reply["error"]["code"], -32000);
    assert!(reply["error"]["message"]
        .as_str()
        .unwrap()
        .contains("not whitelisted"));
}

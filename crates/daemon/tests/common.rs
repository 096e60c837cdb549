// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: helpers are shared across test binaries.
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

pub const WAIT: Duration = Duration::from_secs(10);

/// Spawned agent process, killed on drop.
pub struct AgentProcess {
    child: Child,
}

impl AgentProcess {
    pub fn spawn(state_dir: &Path, host: &str) -> Self {
        let child = Command::new(env!("CARGO_BIN_EXE_uplinkd"))
            .arg("--state-dir")
            .arg(state_dir)
            .arg("--host")
            .arg(host)
            .arg("--device-id")
            .arg("dev-1")
            .env_remove("UPLINK_TOKEN")
            .env_remove("UPLINK_HOST")
            .env_remove("UPLINK_DEVICE_ID")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn agent process");
        AgentProcess { child }
    }
}

impl Drop for AgentProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn write_config(state_dir: &Path, extra: &str) {
    let config = r#"
token = "secret-token"
frame_size = 64
poll_interval_ms = 50
"#;
    std::fs::write(state_dir.join("config.toml"), format!("{config}{extra}\n")).unwrap();
}

/// Accepts one session, recording the request path and cookie header.
pub async fn accept_session(
    listener: &TcpListener,
) -> (WebSocketStream<TcpStream>, String, Option<String>) {
    let (socket, _) = tokio::time::timeout(WAIT, listener.accept())
        .await
        .expect("agent should connect")
        .unwrap();
    let seen = Arc::new(Mutex::new((String::new(), None::<String>)));
    let record = Arc::clone(&seen);
    let ws = tokio_tungstenite::accept_hdr_async(socket, move |req: &Request, resp: Response| {
        let cookie = req
            .headers()
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        *record.lock().unwrap() = (req.uri().path().to_string(), cookie);
        Ok(resp)
    })
    .await
    .unwrap();
    let (path, cookie) = seen.lock().unwrap().clone();
    (ws, path, cookie)
}

pub async fn call(ws: &mut WebSocketStream<TcpStream>, request: Value) -> Value {
    ws.send(Message::Text(request.to_string().into())).await.unwrap();
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("reply in time")
            .expect("stream open")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Command for a foreground agent run that is expected to exit.
pub fn agent_command(state_dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_uplinkd"));
    cmd.arg("--state-dir")
        .arg(state_dir)
        .env_remove("UPLINK_TOKEN")
        .env_remove("UPLINK_HOST")
        .env_remove("UPLINK_DEVICE_ID")
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

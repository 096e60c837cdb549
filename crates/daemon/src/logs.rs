// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Log forwarding.
//!
//! The forwarder ships one log bundle per cycle as a `forwardLogs` request
//! whose id is the bundle name, then waits a bounded time for the matching
//! response. A bundle acknowledged with `success` is removed from its source.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uplink_core::rpc::{response_id, response_success};
use uplink_core::RpcRequest;

use crate::session::Session;

/// Method name of log forwarding requests.
pub const FORWARD_METHOD: &str = "forwardLogs";

/// A store of log bundles addressed by name.
pub trait LogSource: Send + Sync {
    /// Bundle names, sorted oldest (lowest) first.
    fn list(&self) -> std::io::Result<Vec<String>>;

    fn read(&self, name: &str) -> std::io::Result<String>;

    fn remove(&self, name: &str) -> std::io::Result<()>;
}

/// Log bundles stored as files in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryLogSource {
    dir: PathBuf,
}

impl DirectoryLogSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectoryLogSource { dir: dir.into() }
    }

    fn entry_path(&self, name: &str) -> std::io::Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid log name '{name}'"),
            ));
        }
        Ok(self.dir.join(name))
    }
}

impl LogSource for DirectoryLogSource {
    fn list(&self) -> std::io::Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.entry_path(name)?)
    }

    fn remove(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.entry_path(name)?)
    }
}

/// Timing of the forwarder.
#[derive(Debug, Clone, Copy)]
pub struct ForwarderTiming {
    /// How often the source is rescanned.
    pub scan_interval: Duration,
    /// Length of one wait on the response queue.
    pub poll: Duration,
    /// Number of waits spent on one acknowledgement.
    pub response_polls: u32,
}

/// Log forwarder role of one session.
pub struct LogForwarder {
    source: Option<Arc<dyn LogSource>>,
    timing: ForwarderTiming,
}

impl LogForwarder {
    /// Creates a forwarder. Without a source it only drains responses.
    pub fn new(source: Option<Arc<dyn LogSource>>, timing: ForwarderTiming) -> Self {
        LogForwarder { source, timing }
    }

    /// Runs until the session ends.
    pub async fn run(&self, session: &Session) {
        let mut entries: Vec<String> = Vec::new();
        let mut last_scan: Option<Instant> = None;

        while !session.is_terminated() {
            if last_scan.is_none_or(|at| at.elapsed() >= self.timing.scan_interval) {
                entries = self.scan();
                last_scan = Some(Instant::now());
            }

            let pending = match entries.pop() {
                Some(name) => self.send(session, name),
                None => None,
            };
            self.await_response(session, pending.as_deref()).await;
        }
        debug!("log forwarder stopped");
    }

    fn scan(&self) -> Vec<String> {
        let Some(source) = &self.source else {
            return Vec::new();
        };
        match source.list() {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "failed to list logs");
                Vec::new()
            }
        }
    }

    /// Queues a forward request for `name`; returns the id to wait for.
    fn send(&self, session: &Session, name: String) -> Option<String> {
        let source = self.source.as_ref()?;
        let contents = match source.read(&name) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(log = %name, error = %e, "failed to read log");
                return None;
            }
        };
        let request = RpcRequest::new(FORWARD_METHOD, json!({ "logs": contents }), name.clone());
        match request.to_json() {
            Ok(text) => {
                info!(log = %name, "forward request");
                session.outbound.low.push(text);
                Some(name)
            }
            Err(e) => {
                warn!(log = %name, error = %e, "failed to encode log");
                None
            }
        }
    }

    /// Drains responses until `pending` is acknowledged or the polls run
    /// out. With nothing pending, returns at the first empty poll.
    async fn await_response(&self, session: &Session, pending: Option<&str>) {
        for _ in 0..self.timing.response_polls {
            let response = tokio::select! {
                _ = session.token().cancelled() => return,
                response = session.responses.pop_timeout(self.timing.poll) => response,
            };
            let Some(response) = response else {
                if pending.is_none() {
                    return;
                }
                continue;
            };

            let id = response_id(&response);
            let success = response_success(&response);
            info!(log = ?id, success, "forward response");
            if success {
                if let (Some(source), Some(id)) = (&self.source, &id) {
                    if let Err(e) = source.remove(id) {
                        warn!(log = %id, error = %e, "failed to remove forwarded log");
                    }
                }
            }
            if pending.is_some() && id.as_deref() == pending {
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect loop and per-session role management.
//!
//! Each connection gets a fresh [`Session`] whose token is a child of the
//! shutdown token. All roles run as tasks observing that token; the session
//! ends when any of them cancels it, and is then torn down completely before
//! the next attempt.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uplink_core::backoff_secs;

use crate::agent::Agent;
use crate::dispatch::run_dispatcher;
use crate::error::Result;
use crate::logs::{ForwarderTiming, LogForwarder};
use crate::methods::session_registry;
use crate::session::Session;
use crate::transport::{self, Connection};
use crate::uploads::WorkerTiming;

/// How a pass through the reconnect loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// A session ran and ended.
    SessionEnded,
    /// No session could be established.
    Failed,
    /// Shutdown was requested.
    Shutdown,
}

/// Owns the reconnect loop.
pub struct Supervisor {
    agent: Agent,
}

impl Supervisor {
    pub fn new(agent: Agent) -> Self {
        Supervisor { agent }
    }

    /// Connects and reconnects until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: &CancellationToken) {
        let mut retries: u32 = 0;
        loop {
            match self.attempt(shutdown).await {
                Attempt::Shutdown => break,
                Attempt::SessionEnded => retries = 0,
                Attempt::Failed => retries = retries.saturating_add(1),
            }

            let delay = Duration::from_secs(backoff_secs(retries));
            debug!(retries, delay_secs = delay.as_secs(), "reconnecting");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        info!("supervisor stopped");
    }

    /// One connection attempt, including the session it starts.
    pub async fn attempt(&self, shutdown: &CancellationToken) -> Attempt {
        let url = self.agent.config.session_url();
        info!(%url, "connecting");
        let connection = tokio::select! {
            _ = shutdown.cancelled() => return Attempt::Shutdown,
            connection = self.connect(&url) => connection,
        };
        let connection = match connection {
            Ok(connection) => connection,
            Err(e) => {
                warn!(error = %e, "connection failed");
                return Attempt::Failed;
            }
        };

        info!("session started");
        self.agent.uploads.registry().clear();
        self.run_session(connection, shutdown).await;

        if shutdown.is_cancelled() {
            Attempt::Shutdown
        } else {
            info!("session ended");
            Attempt::SessionEnded
        }
    }

    async fn connect(&self, url: &str) -> Result<Connection> {
        let token = self.agent.tokens.token().await?;
        let connection = transport::connect(url, &token, self.agent.config.connect_timeout()).await?;
        Ok(connection)
    }

    /// Runs every role of one session and waits for all of them to stop.
    pub async fn run_session(&self, connection: Connection, shutdown: &CancellationToken) {
        let agent = &self.agent;
        let config = Arc::clone(&agent.config);
        let token = shutdown.child_token();
        let session = Arc::new(Session::new(token.clone()));
        let registry = Arc::new(session_registry(agent, &token));
        debug!(methods = ?registry.methods(), "method registry built");
        let (sink, stream) = connection.ws.split();
        let poll = config.poll_interval();

        let mut roles: Vec<JoinHandle<()>> = Vec::new();

        roles.push({
            let session = Arc::clone(&session);
            let frame_size = config.frame_size;
            tokio::spawn(async move {
                transport::run_writer(sink, &session, frame_size, poll).await;
            })
        });

        roles.push({
            let session = Arc::clone(&session);
            let silence_limit = config.reconnect_timeout();
            tokio::spawn(async move {
                transport::run_reader(stream, &session, poll, silence_limit).await;
            })
        });

        roles.push(tokio::spawn(transport::run_keepalive(
            connection.socket,
            Arc::clone(&agent.device),
            token.clone(),
            config.keepalive_check_interval(),
        )));

        let timing = WorkerTiming {
            poll,
            retry_delay: config.retry_delay(),
        };
        for index in 0..agent.uploads.registry().len() {
            let uploads = Arc::clone(&agent.uploads);
            let uploader = Arc::clone(&agent.uploader);
            let device = Arc::clone(&agent.device);
            let token = token.clone();
            roles.push(tokio::spawn(async move {
                uploads
                    .run_worker(index, uploader.as_ref(), device, &token, timing)
                    .await;
            }));
        }

        roles.push({
            let session = Arc::clone(&session);
            let forwarder = LogForwarder::new(
                agent.logs.clone(),
                ForwarderTiming {
                    scan_interval: config.log_scan_interval(),
                    poll,
                    response_polls: config.log_response_polls,
                },
            );
            tokio::spawn(async move { forwarder.run(&session).await })
        });

        for _ in 0..config.handler_workers {
            let session = Arc::clone(&session);
            let registry = Arc::clone(&registry);
            roles.push(tokio::spawn(async move {
                run_dispatcher(registry, &session, poll).await;
            }));
        }

        token.cancelled().await;
        info!(roles = roles.len(), "session terminating, joining roles");
        for role in roles {
            if let Err(e) = role.await {
                warn!(error = %e, "session role failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! uplinkd: device-side command agent.
//!
//! Keeps a WebSocket session open to the command server, answers JSON-RPC
//! calls on it, uploads requested files, forwards log bundles and tunnels
//! local TCP ports. The session is rebuilt from scratch after any fault.

pub mod agent;
pub mod auth;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod logs;
pub mod methods;
pub mod queue;
pub mod session;
pub mod store;
pub mod supervisor;
pub mod transfer;
pub mod transport;
pub mod tunnel;
pub mod uploads;

#[cfg(test)]
mod test_helpers;

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use agent::Agent;
pub use config::AgentConfig;
pub use error::{Error, Result};
pub use supervisor::Supervisor;

/// Restores the upload queue and runs the supervisor until `shutdown`.
pub async fn run(agent: Agent, shutdown: CancellationToken) -> Result<()> {
    match agent.uploads.restore() {
        Ok(count) => info!(count, "restored upload queue"),
        Err(e) => warn!(error = %e, "failed to restore upload queue"),
    }
    Supervisor::new(agent).run(&shutdown).await;
    Ok(())
}

/// Starts the agent described by `config`.
pub async fn run_with_config(config: AgentConfig, state_dir: &Path, shutdown: CancellationToken) -> Result<()> {
    let agent = Agent::from_config(config, state_dir)?;
    run(agent, shutdown).await
}

/// Resolves once SIGINT or SIGTERM is received.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration.
//!
//! Configuration is read from an optional TOML file. Every field has a
//! default, so an empty file (or no file) yields a usable config once a
//! device id is known. Environment variables then override file values, and
//! command-line flags override both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{Error, Result};

const QUEUE_FILE_NAME: &str = "upload_queue.jsonl";

/// Runtime configuration for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base address of the command server (e.g. `wss://athena.example.com`).
    pub host: String,
    /// Identity of this device; part of the session URL.
    pub device_id: String,
    /// Number of RPC dispatcher workers.
    pub handler_workers: usize,
    /// Number of upload workers.
    pub upload_workers: usize,
    /// Silence from the server after which a session is considered dead.
    pub reconnect_timeout_secs: u64,
    /// Failed transfers are retried this many times before being dropped.
    pub max_retry_count: u32,
    /// Pause after a failed transfer before the worker claims again.
    pub retry_delay_secs: u64,
    /// Maximum payload of one outbound frame, in bytes.
    pub frame_size: usize,
    /// Local ports `startLocalProxy` may connect to.
    pub local_port_allowlist: Vec<u16>,
    /// Bound on every queue wait, so roles re-check for shutdown.
    pub poll_interval_ms: u64,
    /// How often the keepalive tuner looks at the device mode.
    pub keepalive_check_secs: u64,
    /// How often the log directory is rescanned.
    pub log_scan_interval_secs: u64,
    /// Number of polls spent waiting for a `forwardLogs` acknowledgement.
    pub log_response_polls: u32,
    /// Timeout of one upload request.
    pub upload_timeout_secs: u64,
    /// Timeout of the connection handshake.
    pub connect_timeout_secs: u64,
    /// Directory relative upload names are resolved against.
    pub upload_root: PathBuf,
    /// Directory holding log bundles to forward.
    pub log_dir: Option<PathBuf>,
    /// Public key returned by `getPublicKey`.
    pub public_key_path: Option<PathBuf>,
    /// Directory of device flag files (`IsOnroad`, `NetworkMetered`).
    pub params_dir: Option<PathBuf>,
    /// Upload queue snapshot; defaults to the state directory.
    pub queue_path: Option<PathBuf>,
    /// Static bearer token.
    pub token: Option<String>,
    /// Token service used when no static token is configured.
    pub auth_url: Option<String>,
    /// Initial metered flag when no params directory is configured.
    pub network_metered: bool,
    /// Initial active flag when no params directory is configured.
    pub active: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            host: default_host(),
            device_id: String::new(),
            handler_workers: 4,
            upload_workers: 1,
            reconnect_timeout_secs: 70,
            max_retry_count: 30,
            retry_delay_secs: 10,
            frame_size: uplink_core::frame::DEFAULT_FRAME_SIZE,
            local_port_allowlist: vec![8022],
            poll_interval_ms: 1000,
            keepalive_check_secs: 5,
            log_scan_interval_secs: 10,
            log_response_polls: 100,
            upload_timeout_secs: 30,
            connect_timeout_secs: 30,
            upload_root: PathBuf::from("."),
            log_dir: None,
            public_key_path: None,
            params_dir: None,
            queue_path: None,
            token: None,
            auth_url: None,
            network_metered: false,
            active: false,
        }
    }
}

fn default_host() -> String {
    "ws://localhost:3111".to_string()
}

/// Values layered over the config file, from the environment or flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub device_id: Option<String>,
    pub handler_workers: Option<usize>,
    pub token: Option<String>,
}

impl Overrides {
    /// Reads the overrides from the process environment.
    pub fn from_env() -> Self {
        Overrides {
            host: env::host(),
            device_id: env::device_id(),
            handler_workers: env::handler_workers(),
            token: env::token(),
        }
    }
}

impl AgentConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// Loads `file` if given, applies the environment then the flags, and
    /// validates the result.
    pub fn resolve(file: Option<&Path>, env: Overrides, flags: Overrides) -> Result<Self> {
        let base = match file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        let config = base.with_overrides(env).with_overrides(flags);
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(device_id) = overrides.device_id {
            self.device_id = device_id;
        }
        if let Some(workers) = overrides.handler_workers {
            self.handler_workers = workers;
        }
        if let Some(token) = overrides.token {
            self.token = Some(token);
        }
        self
    }

    /// Checks the values the agent cannot run without.
    pub fn validate(&self) -> Result<()> {
        if self.device_id.trim().is_empty() {
            return Err(Error::Config("device_id must be set".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must be set".to_string()));
        }
        if self.handler_workers == 0 || self.upload_workers == 0 {
            return Err(Error::Config(
                "handler_workers and upload_workers must be at least 1".to_string(),
            ));
        }
        if self.frame_size == 0 {
            return Err(Error::Config("frame_size must be at least 1".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be at least 1".to_string()));
        }
        Ok(())
    }

    /// URL of the primary session.
    pub fn session_url(&self) -> String {
        format!("{}/ws/v2/{}", self.host.trim_end_matches('/'), self.device_id)
    }

    /// Snapshot file of the upload queue.
    pub fn queue_path(&self, state_dir: &Path) -> PathBuf {
        self.queue_path
            .clone()
            .unwrap_or_else(|| state_dir.join(QUEUE_FILE_NAME))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_timeout(&self) -> Duration {
        Duration::from_secs(self.reconnect_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn keepalive_check_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_check_secs)
    }

    pub fn log_scan_interval(&self) -> Duration {
        Duration::from_secs(self.log_scan_interval_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Resolves the state directory.
///
/// Order: explicit flag, `UPLINK_STATE_DIR`, `$XDG_STATE_HOME/uplink`,
/// `~/.local/state/uplink`.
pub fn resolve_state_dir(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Some(dir) = env::state_dir() {
        return dir;
    }
    if let Some(dir) = env::xdg_state_home() {
        return dir.join("uplink");
    }
    dirs::home_dir()
        .map(|h| h.join(".local/state/uplink"))
        .unwrap_or_else(|| PathBuf::from(".local/state/uplink"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

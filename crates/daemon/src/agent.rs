// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide context handed to every session.

use std::path::Path;
use std::sync::Arc;

use crate::auth::{AuthError, HttpTokenProvider, StaticToken, TokenProvider};
use crate::config::AgentConfig;
use crate::device::{DeviceState, ParamsDeviceState, StaticDeviceState};
use crate::error::Result;
use crate::logs::{DirectoryLogSource, LogSource};
use crate::store::UploadQueueStore;
use crate::transfer::HttpUploader;
use crate::uploads::{UploadManager, Uploader};

/// Shared state and collaborators of the agent.
///
/// Outlives every session: the upload queue, the cancellation set and the
/// worker registry survive reconnects.
#[derive(Clone)]
pub struct Agent {
    pub config: Arc<AgentConfig>,
    pub uploads: Arc<UploadManager>,
    pub tokens: Arc<dyn TokenProvider>,
    pub device: Arc<dyn DeviceState>,
    pub uploader: Arc<dyn Uploader>,
    pub logs: Option<Arc<dyn LogSource>>,
}

impl Agent {
    /// Builds the production collaborators described by `config`.
    pub fn from_config(config: AgentConfig, state_dir: &Path) -> Result<Self> {
        let tokens: Arc<dyn TokenProvider> = match (&config.token, &config.auth_url) {
            (Some(token), _) => Arc::new(StaticToken::new(token.clone())),
            (None, Some(url)) => Arc::new(HttpTokenProvider::new(url.clone(), config.device_id.clone())),
            (None, None) => return Err(AuthError::NotConfigured.into()),
        };
        let device: Arc<dyn DeviceState> = match &config.params_dir {
            Some(dir) => Arc::new(ParamsDeviceState::new(dir.clone())),
            None => Arc::new(StaticDeviceState::new(config.network_metered, config.active)),
        };
        let logs = config
            .log_dir
            .as_ref()
            .map(|dir| Arc::new(DirectoryLogSource::new(dir.clone())) as Arc<dyn LogSource>);
        let uploader = Arc::new(HttpUploader::new(config.upload_timeout()));
        let store = UploadQueueStore::new(config.queue_path(state_dir));

        Ok(Agent::new(config, store, tokens, device, uploader, logs))
    }

    /// Assembles an agent from explicit parts.
    pub fn new(
        config: AgentConfig,
        store: UploadQueueStore,
        tokens: Arc<dyn TokenProvider>,
        device: Arc<dyn DeviceState>,
        uploader: Arc<dyn Uploader>,
        logs: Option<Arc<dyn LogSource>>,
    ) -> Self {
        let uploads = Arc::new(UploadManager::new(
            store,
            config.upload_workers,
            config.max_retry_count,
        ));
        Agent {
            config: Arc::new(config),
            uploads,
            tokens,
            device,
            uploader,
            logs,
        }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;

use std::fmt;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use futures_util::future::try_join_all;
use serde::Serialize;
use tokio::sync::RwLock;

use super::cache::CacheStorage;
use super::network::Network;
use super::{RequestMode, ResponseKind, ShellError, ShellRequest, ShellResponse};
use crate::settings::ShellConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; the worker never controls requests.
    Redundant,
}

impl WorkerState {
    fn name(self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub enum FetchOutcome {
    /// Not intercepted; the request goes to the network untouched.
    Ignored,
    Respond(ShellResponse),
}

/// Lifecycle and fetch strategy of the shell.
pub struct ShellWorker {
    cache_name: String,
    assets: Vec<String>,
    entry_page: String,
    storage: Arc<CacheStorage>,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
}

impl ShellWorker {
    pub fn new(
        cache_name: &str,
        assets: Vec<String>,
        entry_page: &str,
        storage: Arc<CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            cache_name: cache_name.to_string(),
            assets,
            entry_page: entry_page.to_string(),
            storage,
            network,
            state: RwLock::new(WorkerState::Parsed),
        }
    }

    pub fn from_config(config: &ShellConfig, storage: Arc<CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self::new(
            &config.cache_name,
            config.assets.clone(),
            &config.entry_page,
            storage,
            network,
        )
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Installs, then activates right away without waiting for older
    /// workers to go idle.
    pub async fn start(&self) -> Result<(), ShellError> {
        self.install().await?;
        self.activate().await
    }

    /// Fetches every shell asset and stores them in the named cache. Either
    /// all assets are stored or none are.
    pub async fn install(&self) -> Result<(), ShellError> {
        *self.state.write().await = WorkerState::Installing;

        let fetches = self.assets.iter().map(|asset| async move {
            let response = self
                .network
                .fetch(&ShellRequest::get(asset))
                .await
                .map_err(|e| ShellError::Install(format!("{}: {}", asset, e)))?;

            if !response.status.is_success() {
                return Err(ShellError::Install(format!("{} returned {}", asset, response.status)));
            }
            Ok::<_, ShellError>((asset.as_str(), response))
        });

        let responses = match try_join_all(fetches).await {
            Ok(responses) => responses,
            Err(e) => {
                *self.state.write().await = WorkerState::Redundant;
                return Err(e);
            }
        };

        let cache = self.storage.open(&self.cache_name);
        for (asset, response) in responses {
            cache.put(asset, response);
        }

        *self.state.write().await = WorkerState::Installed;
        log::info!("Installed shell cache {} with {} assets.", self.cache_name, cache.len());
        Ok(())
    }

    /// Drops every cache but the current one and starts serving.
    pub async fn activate(&self) -> Result<(), ShellError> {
        {
            let mut state = self.state.write().await;
            if *state != WorkerState::Installed {
                return Err(ShellError::NotInstalled(state.name()));
            }
            *state = WorkerState::Activating;
        }

        for key in self.storage.keys() {
            if key != self.cache_name {
                self.storage.delete(&key);
                log::info!("Deleted stale shell cache {}.", key);
            }
        }

        *self.state.write().await = WorkerState::Activated;
        Ok(())
    }

    pub async fn handle_fetch(&self, request: &ShellRequest) -> Result<FetchOutcome, ShellError> {
        if self.state().await != WorkerState::Activated || request.method != Method::GET {
            return Ok(FetchOutcome::Ignored);
        }

        if request.mode == RequestMode::Navigate {
            if let Some(cached) = self.storage.match_url(&self.entry_page) {
                return Ok(FetchOutcome::Respond(cached));
            }
            return self.network.fetch(request).await.map(FetchOutcome::Respond);
        }

        if let Some(cached) = self.storage.match_url(&request.url) {
            return Ok(FetchOutcome::Respond(cached));
        }

        let cache = self.storage.open(&self.cache_name);
        match self.network.fetch(request).await {
            Ok(response) => {
                if response.status == StatusCode::OK && response.kind == ResponseKind::Basic {
                    cache.put(&request.url, response.clone());
                }
                Ok(FetchOutcome::Respond(response))
            }
            Err(e) => {
                log::warn!("Network failed for {}, falling back to {}: {}", request.url, self.entry_page, e);
                self.storage
                    .match_url(&self.entry_page)
                    .map(FetchOutcome::Respond)
                    .ok_or(e)
            }
        }
    }
}

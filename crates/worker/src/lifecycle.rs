//! Versioned cache lifecycle: install, activate, serve.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clients::ClientRegistry;
use crate::error::WorkerError;
use crate::fetch::{AssetFetcher, CachedResponse};
use crate::manifest::{validate_version, AssetManifest};
use crate::snapshot::SnapshotStore;

/// Where the cache manager is in its lifecycle.
///
/// `Uninstalled → Installing → Installed → Activating → Active`. A new
/// version restarts at `Installing` while the old one keeps being served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "version", rename_all = "snake_case")]
pub enum CacheState {
    Uninstalled,
    Installing(String),
    Installed(String),
    Activating(String),
    Active(String),
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheState::Uninstalled => write!(f, "uninstalled"),
            CacheState::Installing(v) => write!(f, "installing {v}"),
            CacheState::Installed(v) => write!(f, "installed {v}"),
            CacheState::Activating(v) => write!(f, "activating {v}"),
            CacheState::Active(v) => write!(f, "active {v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub version: String,
    pub cached: Vec<String>,
    /// Paths skipped, with the reason.
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub version: String,
    pub deleted: Vec<String>,
    /// Old snapshots that could not be deleted, with the reason.
    pub retained: Vec<(String, String)>,
    pub claimed: usize,
}

/// What the fetch hook does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDisposition {
    /// Let the request go to the network untouched.
    Network,
}

struct Lifecycle {
    state: CacheState,
    /// Snapshot answering `cached` lookups.
    serving: Option<String>,
    skip_waiting: bool,
}

pub struct CacheManager {
    store: Arc<dyn SnapshotStore>,
    fetcher: Arc<dyn AssetFetcher>,
    clients: ClientRegistry,
    lifecycle: RwLock<Lifecycle>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn SnapshotStore>, fetcher: Arc<dyn AssetFetcher>) -> Self {
        CacheManager {
            store,
            fetcher,
            clients: ClientRegistry::new(),
            lifecycle: RwLock::new(Lifecycle {
                state: CacheState::Uninstalled,
                serving: None,
                skip_waiting: false,
            }),
        }
    }

    pub fn with_clients(mut self, clients: ClientRegistry) -> Self {
        self.clients = clients;
        self
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    pub async fn state(&self) -> CacheState {
        self.lifecycle.read().await.state.clone()
    }

    pub async fn serving_version(&self) -> Option<String> {
        self.lifecycle.read().await.serving.clone()
    }

    /// Pick up the snapshot activated by a previous run.
    pub async fn resume(&self) -> Result<CacheState, WorkerError> {
        let active = self.store.active().await?;
        let mut lifecycle = self.lifecycle.write().await;
        if let Some(version) = active {
            debug!(version = %version, "resuming active cache");
            lifecycle.state = CacheState::Active(version.clone());
            lifecycle.serving = Some(version);
        }
        Ok(lifecycle.state.clone())
    }

    /// Treat a snapshot stored by an earlier process as freshly installed so
    /// it can be activated.
    pub async fn adopt(&self, version: &str) -> Result<CacheState, WorkerError> {
        validate_version(version)?;
        if !self.store.names().await?.iter().any(|n| n == version) {
            return Err(WorkerError::NotInstalled(version.to_string()));
        }
        let mut lifecycle = self.lifecycle.write().await;
        lifecycle.state = CacheState::Installed(version.to_string());
        Ok(lifecycle.state.clone())
    }

    /// Fetch every manifest path into the snapshot named by its version.
    ///
    /// Paths that fail to fetch or store are logged and skipped. The install
    /// completes whatever the number of failures.
    pub async fn install(&self, manifest: &AssetManifest) -> Result<InstallReport, WorkerError> {
        manifest.validate()?;
        let previous = {
            let mut lifecycle = self.lifecycle.write().await;
            if matches!(
                lifecycle.state,
                CacheState::Installing(_) | CacheState::Activating(_)
            ) {
                return Err(WorkerError::InvalidState {
                    state: lifecycle.state.clone(),
                    operation: "install",
                });
            }
            lifecycle.skip_waiting = false;
            std::mem::replace(
                &mut lifecycle.state,
                CacheState::Installing(manifest.version.clone()),
            )
        };
        info!(version = %manifest.version, paths = manifest.paths.len(), "installing cache");
        if let Err(e) = self.store.open(&manifest.version).await {
            self.lifecycle.write().await.state = previous;
            return Err(e);
        }

        let mut report = InstallReport {
            version: manifest.version.clone(),
            cached: Vec::new(),
            failed: Vec::new(),
        };
        for path in &manifest.paths {
            match self.cache_one(&manifest.version, path).await {
                Ok(()) => report.cached.push(path.clone()),
                Err(reason) => {
                    warn!(path = %path, reason = %reason, "could not cache asset");
                    report.failed.push((path.clone(), reason));
                }
            }
        }

        self.lifecycle.write().await.state = CacheState::Installed(manifest.version.clone());
        info!(
            version = %manifest.version,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "cache installed"
        );
        Ok(report)
    }

    async fn cache_one(&self, version: &str, path: &str) -> Result<(), String> {
        let response = self.fetcher.fetch(path).await.map_err(|e| e.to_string())?;
        self.store
            .put(version, &response)
            .await
            .map_err(|e| e.to_string())
    }

    /// Allow the installed version to activate without waiting for clients
    /// of the previous version to close.
    pub async fn skip_waiting(&self) {
        self.lifecycle.write().await.skip_waiting = true;
        debug!("skip waiting requested");
    }

    /// Promote the installed version, delete every other snapshot, and take
    /// control of open clients.
    pub async fn activate(&self) -> Result<ActivationReport, WorkerError> {
        let version = {
            let mut lifecycle = self.lifecycle.write().await;
            let CacheState::Installed(version) = lifecycle.state.clone() else {
                return Err(WorkerError::InvalidState {
                    state: lifecycle.state.clone(),
                    operation: "activate",
                });
            };
            if !lifecycle.skip_waiting {
                let waiting = self.clients.controlled_elsewhere(&version).await;
                if waiting > 0 {
                    return Err(WorkerError::WaitingForClients(waiting));
                }
            }
            lifecycle.state = CacheState::Activating(version.clone());
            version
        };
        info!(version = %version, "activating cache");

        // The new snapshot becomes current before any old one is removed.
        if let Err(e) = self.store.set_active(&version).await {
            self.lifecycle.write().await.state = CacheState::Installed(version);
            return Err(e);
        }
        {
            let mut lifecycle = self.lifecycle.write().await;
            lifecycle.serving = Some(version.clone());
            lifecycle.state = CacheState::Active(version.clone());
        }

        let (deleted, retained) = self.delete_others(&version).await;
        let claimed = self.clients.claim(&version).await;
        Ok(ActivationReport {
            version,
            deleted,
            retained,
            claimed,
        })
    }

    /// Remove every snapshot but `version`. Failures leave the old snapshot
    /// in place and do not undo the activation.
    async fn delete_others(&self, version: &str) -> (Vec<String>, Vec<(String, String)>) {
        let mut deleted = Vec::new();
        let mut retained = Vec::new();
        let names = match self.store.names().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "could not list old caches");
                return (deleted, retained);
            }
        };
        for name in names.into_iter().filter(|name| name != version) {
            match self.store.delete(&name).await {
                Ok(true) => {
                    info!(version = %name, "old cache deleted");
                    deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(version = %name, error = %e, "old cache could not be deleted");
                    retained.push((name, e.to_string()));
                }
            }
        }
        (deleted, retained)
    }

    /// Request hook. Never intercepts.
    pub fn handle_fetch(&self, path: &str) -> FetchDisposition {
        debug!(path, "fetch passed through to network");
        FetchDisposition::Network
    }

    /// Look `path` up in the snapshot currently served.
    pub async fn cached(&self, path: &str) -> Result<Option<CachedResponse>, WorkerError> {
        let Some(version) = self.serving_version().await else {
            return Ok(None);
        };
        self.store.get(&version, path).await
    }
}

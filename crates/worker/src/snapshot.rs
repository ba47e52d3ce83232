//! Named snapshot sets of cached responses.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::error::WorkerError;
use crate::fetch::CachedResponse;
use crate::manifest::validate_version;

const ACTIVE_FILE: &str = "ACTIVE";

/// Storage for cache snapshots, one set per version name.
///
/// Writes of a single entry are atomic: a reader sees either the whole entry
/// or none of it.
#[async_trait]
pub trait SnapshotStore: Send + Sync + 'static {
    /// Every stored snapshot name, sorted.
    async fn names(&self) -> Result<Vec<String>, WorkerError>;

    /// Create an empty snapshot if none exists under `version`.
    async fn open(&self, version: &str) -> Result<(), WorkerError>;

    async fn put(&self, version: &str, response: &CachedResponse) -> Result<(), WorkerError>;

    async fn get(&self, version: &str, path: &str)
        -> Result<Option<CachedResponse>, WorkerError>;

    /// Cached paths of one snapshot, sorted.
    async fn paths(&self, version: &str) -> Result<Vec<String>, WorkerError>;

    /// Returns false if the snapshot did not exist.
    async fn delete(&self, version: &str) -> Result<bool, WorkerError>;

    /// The snapshot currently served, if any was activated.
    async fn active(&self) -> Result<Option<String>, WorkerError>;

    async fn set_active(&self, version: &str) -> Result<(), WorkerError>;
}

// ──────────────────────────────────────────────
// Filesystem
// ──────────────────────────────────────────────

/// Snapshots as directories under `root`:
///
/// ```text
/// <root>/ACTIVE                      active version name
/// <root>/<version>/<sha256>.json     path, status, content type
/// <root>/<version>/<sha256>.body     response bytes
/// ```
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    root: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsSnapshotStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_dir(&self, version: &str) -> Result<PathBuf, WorkerError> {
        validate_version(version)?;
        Ok(self.root.join(version))
    }
}

fn entry_stem(path: &str) -> String {
    format!("{:x}", Sha256::digest(path.as_bytes()))
}

async fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), WorkerError> {
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| WorkerError::storage(&tmp, e))?;
    tokio::fs::rename(&tmp, target)
        .await
        .map_err(|e| WorkerError::storage(target, e))
}

async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, WorkerError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(WorkerError::storage(path, e)),
    }
}

fn parse_meta(path: &Path, bytes: &[u8]) -> Result<CachedResponse, WorkerError> {
    serde_json::from_slice(bytes).map_err(|e| WorkerError::CorruptEntry {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn names(&self) -> Result<Vec<String>, WorkerError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WorkerError::storage(&self.root, e)),
        };
        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| WorkerError::storage(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| WorkerError::storage(&entry.path(), e))?
                .is_dir();
            let name = entry.file_name().to_string_lossy().to_string();
            if is_dir && validate_version(&name).is_ok() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn open(&self, version: &str) -> Result<(), WorkerError> {
        let dir = self.version_dir(version)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| WorkerError::storage(&dir, e))
    }

    async fn put(&self, version: &str, response: &CachedResponse) -> Result<(), WorkerError> {
        let dir = self.version_dir(version)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| WorkerError::storage(&dir, e))?;

        let stem = entry_stem(&response.path);
        let meta = serde_json::to_vec_pretty(response).map_err(|e| WorkerError::CorruptEntry {
            path: response.path.clone(),
            message: e.to_string(),
        })?;
        // Body first: the entry exists once its metadata does.
        write_atomic(&dir.join(format!("{stem}.body")), &response.body).await?;
        write_atomic(&dir.join(format!("{stem}.json")), &meta).await
    }

    async fn get(
        &self,
        version: &str,
        path: &str,
    ) -> Result<Option<CachedResponse>, WorkerError> {
        let dir = self.version_dir(version)?;
        let stem = entry_stem(path);
        let meta_path = dir.join(format!("{stem}.json"));
        let Some(meta) = read_if_exists(&meta_path).await? else {
            return Ok(None);
        };
        let mut response = parse_meta(&meta_path, &meta)?;
        let body_path = dir.join(format!("{stem}.body"));
        response.body = read_if_exists(&body_path)
            .await?
            .ok_or_else(|| WorkerError::CorruptEntry {
                path: body_path.display().to_string(),
                message: "body missing".to_string(),
            })?;
        Ok(Some(response))
    }

    async fn paths(&self, version: &str) -> Result<Vec<String>, WorkerError> {
        let dir = self.version_dir(version)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WorkerError::storage(&dir, e)),
        };
        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| WorkerError::storage(&dir, e))?
        {
            let file = entry.path();
            if file.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&file)
                .await
                .map_err(|e| WorkerError::storage(&file, e))?;
            paths.push(parse_meta(&file, &bytes)?.path);
        }
        paths.sort();
        Ok(paths)
    }

    async fn delete(&self, version: &str) -> Result<bool, WorkerError> {
        let dir = self.version_dir(version)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(WorkerError::storage(&dir, e)),
        }
    }

    async fn active(&self) -> Result<Option<String>, WorkerError> {
        let file = self.root.join(ACTIVE_FILE);
        let Some(bytes) = read_if_exists(&file).await? else {
            return Ok(None);
        };
        let name = String::from_utf8_lossy(&bytes).trim().to_string();
        Ok((!name.is_empty()).then_some(name))
    }

    async fn set_active(&self, version: &str) -> Result<(), WorkerError> {
        validate_version(version)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| WorkerError::storage(&self.root, e))?;
        write_atomic(&self.root.join(ACTIVE_FILE), version.as_bytes()).await
    }
}

// ──────────────────────────────────────────────
// In-memory
// ──────────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
    snapshots: BTreeMap<String, BTreeMap<String, CachedResponse>>,
    active: Option<String>,
}

/// Non-durable [`SnapshotStore`] for tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySnapshotStore {
    inner: RwLock<MemoryInner>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn names(&self) -> Result<Vec<String>, WorkerError> {
        Ok(self.inner.read().await.snapshots.keys().cloned().collect())
    }

    async fn open(&self, version: &str) -> Result<(), WorkerError> {
        validate_version(version)?;
        self.inner
            .write()
            .await
            .snapshots
            .entry(version.to_string())
            .or_default();
        Ok(())
    }

    async fn put(&self, version: &str, response: &CachedResponse) -> Result<(), WorkerError> {
        validate_version(version)?;
        self.inner
            .write()
            .await
            .snapshots
            .entry(version.to_string())
            .or_default()
            .insert(response.path.clone(), response.clone());
        Ok(())
    }

    async fn get(
        &self,
        version: &str,
        path: &str,
    ) -> Result<Option<CachedResponse>, WorkerError> {
        Ok(self
            .inner
            .read()
            .await
            .snapshots
            .get(version)
            .and_then(|s| s.get(path))
            .cloned())
    }

    async fn paths(&self, version: &str) -> Result<Vec<String>, WorkerError> {
        Ok(self
            .inner
            .read()
            .await
            .snapshots
            .get(version)
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, version: &str) -> Result<bool, WorkerError> {
        Ok(self.inner.write().await.snapshots.remove(version).is_some())
    }

    async fn active(&self) -> Result<Option<String>, WorkerError> {
        Ok(self.inner.read().await.active.clone())
    }

    async fn set_active(&self, version: &str) -> Result<(), WorkerError> {
        validate_version(version)?;
        self.inner.write().await.active = Some(version.to_string());
        Ok(())
    }
}

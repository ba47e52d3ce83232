//! Client configuration for `rgpl`.
//!
//! Read from `--config <path>`, or from `rgpl.toml` in the working directory
//! when that file exists. Every key is optional.
//!
//! # Example
//!
//! ```toml
//! server_url = "https://rgpl.example.org"
//! data_dir = "/var/lib/rgpl"
//! auth_token = "..."
//! request_timeout_secs = 30
//!
//! [queue]
//! max_bytes = 52428800
//!
//! [cache]
//! version = "rgpl-cache-v3"
//!
//! [worker]
//! probe_interval_secs = 15
//!
//! [log]
//! filter = "rgpl_sync=debug,info"
//! format = "json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use rgpl_worker::{AssetManifest, CACHE_NAME, DEFAULT_OFFLINE_PATHS};
use serde::{Deserialize, Serialize};

/// File looked up in the working directory when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "rgpl.toml";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub server_url: String,
    pub data_dir: PathBuf,
    /// Sent as `Authorization: Bearer <token>` on every API call.
    pub auth_token: Option<String>,
    /// No timeout when unset.
    pub request_timeout_secs: Option<u64>,
    pub queue: QueueSection,
    pub cache: CacheSection,
    pub worker: WorkerSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct QueueSection {
    pub schema_version: u32,
    pub max_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CacheSection {
    /// Snapshot version tag. Bump it on deploy.
    pub version: String,
    /// Paths pre-cached on install.
    pub manifest: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct WorkerSection {
    pub probe_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LogSection {
    pub filter: Option<String>,
    pub format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: "http://127.0.0.1:8000".to_string(),
            data_dir: PathBuf::from(".rgpl"),
            auth_token: None,
            request_timeout_secs: None,
            queue: QueueSection::default(),
            cache: CacheSection::default(),
            worker: WorkerSection::default(),
            log: LogSection::default(),
        }
    }
}

impl Default for QueueSection {
    fn default() -> Self {
        QueueSection {
            schema_version: rgpl_queue::SCHEMA_VERSION,
            max_bytes: None,
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            version: CACHE_NAME.to_string(),
            manifest: DEFAULT_OFFLINE_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Default for WorkerSection {
    fn default() -> Self {
        WorkerSection {
            probe_interval_secs: 15,
        }
    }
}

/// Values given on the command line. They win over file and environment.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub server: Option<String>,
    pub data_dir: Option<PathBuf>,
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Parse a config TOML file from `path`.
pub(crate) fn read_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Resolve the effective configuration: file, then environment, then flags.
pub(crate) fn load(explicit: Option<&Path>, overrides: &Overrides) -> Result<Config, String> {
    let mut config = match explicit {
        Some(path) => read_config(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
            read_config(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => Config::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());
    config.apply_overrides(overrides);
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Apply `RGPL_*` variables read through `var`.
    pub(crate) fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.is_empty());
        if let Some(url) = non_empty("RGPL_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(dir) = non_empty("RGPL_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(token) = non_empty("RGPL_AUTH_TOKEN") {
            self.auth_token = Some(token);
        }
        if let Some(filter) = non_empty("RGPL_LOG") {
            self.log.filter = Some(filter);
        }
    }

    pub(crate) fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(server) = &overrides.server {
            self.server_url = server.clone();
        }
        if let Some(dir) = &overrides.data_dir {
            self.data_dir = dir.clone();
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(format!(
                "server_url must be an http(s) URL, got '{}'",
                self.server_url
            ));
        }
        if self.worker.probe_interval_secs == 0 {
            return Err("worker.probe_interval_secs must be at least 1".to_string());
        }
        rgpl_worker::manifest::validate_version(&self.cache.version).map_err(|e| e.to_string())
    }

    pub(crate) fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub(crate) fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.worker.probe_interval_secs)
    }

    pub(crate) fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub(crate) fn manifest(&self) -> AssetManifest {
        AssetManifest::new(&self.cache.version, self.cache.manifest.iter().cloned())
    }
}

//! Fetching assets for the offline snapshot.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A stored response: what the snapshot returns for a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub path: String,
    pub status: u16,
    pub content_type: Option<String>,
    #[serde(skip)]
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("could not fetch {path}: {message}")]
    Network { path: String, message: String },

    #[error("{path} answered HTTP {status}")]
    Status { path: String, status: u16 },
}

/// Source of asset bytes during install.
#[async_trait]
pub trait AssetFetcher: Send + Sync + 'static {
    /// Fetch one path. Only 2xx answers are cacheable.
    async fn fetch(&self, path: &str) -> Result<CachedResponse, FetchError>;
}

/// Fetches assets from the deployed site with `ureq` inside `spawn_blocking`.
#[derive(Clone)]
pub struct HttpAssetFetcher {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpAssetFetcher {
    pub fn new(base_url: &str) -> Self {
        HttpAssetFetcher {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        if let Some(timeout) = timeout {
            let config = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build();
            self.agent = config.into();
        }
        self
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, path: &str) -> Result<CachedResponse, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let agent = self.agent.clone();
        let owned_path = path.to_string();

        let result = tokio::task::spawn_blocking(move || {
            let response = agent.get(&url).call().map_err(|e| match e {
                ureq::Error::StatusCode(status) => FetchError::Status {
                    path: owned_path.clone(),
                    status,
                },
                other => FetchError::Network {
                    path: owned_path.clone(),
                    message: other.to_string(),
                },
            })?;

            let status = response.status().as_u16();
            if !response.status().is_success() {
                return Err(FetchError::Status {
                    path: owned_path,
                    status,
                });
            }
            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let body = response
                .into_body()
                .read_to_vec()
                .map_err(|e| FetchError::Network {
                    path: owned_path.clone(),
                    message: e.to_string(),
                })?;

            Ok(CachedResponse {
                path: owned_path,
                status,
                content_type,
                body,
            })
        })
        .await
        .map_err(|e| FetchError::Network {
            path: path.to_string(),
            message: format!("task join error: {}", e),
        })?;

        if let Ok(ref response) = result {
            debug!(path, bytes = response.body.len(), "asset fetched");
        }
        result
    }
}

//! HTTP client for the sync server.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` so requests
//! never block the async runtime.

use std::time::Duration;

use async_trait::async_trait;
use rgpl_queue::PendingRecord;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{
    Endpoint, ForceSyncResponse, SyncApi, SyncStatus, ZoneImport, FORCE_SYNC_PATH,
    IMPORT_ZONES_PATH, SYNC_STATUS_PATH,
};
use crate::error::ApiError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const MULTIPART_BOUNDARY: &str = "rgpl-boundary-7f3c9e21";

/// [`SyncApi`] over HTTP against a server root such as `http://127.0.0.1:8000`.
#[derive(Clone)]
pub struct HttpSyncApi {
    base_url: String,
    auth_token: Option<String>,
    agent: ureq::Agent,
    probe_agent: ureq::Agent,
}

impl HttpSyncApi {
    pub fn new(base_url: &str) -> Self {
        HttpSyncApi {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
            agent: ureq::Agent::new_with_defaults(),
            probe_agent: agent_with_timeout(PROBE_TIMEOUT),
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    /// Bound every request (connect, send, and receive) by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.agent = match timeout {
            Some(t) => agent_with_timeout(t),
            None => ureq::Agent::new_with_defaults(),
        };
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST `body` as JSON (or an empty body) and return the raw response text.
    async fn post_json(
        &self,
        path: &'static str,
        body: Option<serde_json::Value>,
    ) -> Result<String, ApiError> {
        let url = self.url(path);
        let agent = self.agent.clone();
        let auth_token = self.auth_token.clone();

        run_blocking(path, move || {
            let mut request = agent.post(&url);
            if let Some(ref token) = auth_token {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }
            let response = match body {
                Some(json) => request.send_json(json),
                None => request.send_empty(),
            }
            .map_err(|e| classify_http_error(e, path))?;

            response
                .into_body()
                .read_to_string()
                .map_err(|e| decode_error(path, e))
        })
        .await
    }

    async fn get_json<T>(&self, path: &'static str) -> Result<T, ApiError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.url(path);
        let agent = self.agent.clone();
        let auth_token = self.auth_token.clone();

        run_blocking(path, move || {
            let mut request = agent.get(&url);
            if let Some(ref token) = auth_token {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }
            let response = request.call().map_err(|e| classify_http_error(e, path))?;
            response
                .into_body()
                .read_json::<T>()
                .map_err(|e| decode_error(path, e))
        })
        .await
    }
}

#[async_trait]
impl SyncApi for HttpSyncApi {
    async fn post_record(
        &self,
        endpoint: Endpoint,
        record: &PendingRecord,
    ) -> Result<serde_json::Value, ApiError> {
        let path = endpoint.path();
        let body = serde_json::to_value(record).map_err(|e| decode_error(path, e))?;
        let text = self.post_json(path, Some(body)).await?;
        debug!(endpoint = path, fields = record.len(), "record posted");
        parse_optional_json(path, &text)
    }

    async fn force_sync(&self) -> Result<ForceSyncResponse, ApiError> {
        let text = self.post_json(FORCE_SYNC_PATH, None).await?;
        serde_json::from_str(&text).map_err(|e| decode_error(FORCE_SYNC_PATH, e))
    }

    async fn sync_status(&self) -> Result<SyncStatus, ApiError> {
        self.get_json(SYNC_STATUS_PATH).await
    }

    async fn import_zones(
        &self,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<ZoneImport, ApiError> {
        let url = self.url(IMPORT_ZONES_PATH);
        let agent = self.agent.clone();
        let auth_token = self.auth_token.clone();
        let body = multipart_file_body(MULTIPART_BOUNDARY, "file", file_name, mime, &bytes);
        let content_type = format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}");

        run_blocking(IMPORT_ZONES_PATH, move || {
            let mut request = agent.post(&url).header("Content-Type", &content_type);
            if let Some(ref token) = auth_token {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }
            let response = request
                .send(&body)
                .map_err(|e| classify_http_error(e, IMPORT_ZONES_PATH))?;
            response
                .into_body()
                .read_json::<ZoneImport>()
                .map_err(|e| decode_error(IMPORT_ZONES_PATH, e))
        })
        .await
    }

    async fn probe(&self) -> bool {
        let url = self.url("/");
        let agent = self.probe_agent.clone();
        let reachable = tokio::task::spawn_blocking(move || match agent.get(&url).call() {
            Ok(_) | Err(ureq::Error::StatusCode(_)) => true,
            Err(_) => false,
        })
        .await
        .unwrap_or(false);
        debug!(reachable, "server probe");
        reachable
    }
}

fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    config.into()
}

async fn run_blocking<T, F>(endpoint: &'static str, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Network {
            endpoint: endpoint.to_string(),
            message: format!("task join error: {}", e),
        })?
}

/// Build a single-part multipart body. ureq v3 has no multipart support.
fn multipart_file_body(
    boundary: &str,
    part: &str,
    file_name: &str,
    mime: &str,
    bytes: &[u8],
) -> Vec<u8> {
    let mime = if mime.is_empty() {
        "application/octet-stream"
    } else {
        mime
    };
    let file_name = escape_header_param(file_name);
    let mut body: Vec<u8> = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{part}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

/// Percent-encode `"`, CR and LF so a quoted header parameter stays on one line.
fn escape_header_param(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("%22"),
            '\r' => escaped.push_str("%0D"),
            '\n' => escaped.push_str("%0A"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn parse_optional_json(endpoint: &str, text: &str) -> Result<serde_json::Value, ApiError> {
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(text).map_err(|e| decode_error(endpoint, e))
}

fn classify_http_error(err: ureq::Error, endpoint: &str) -> ApiError {
    match err {
        ureq::Error::StatusCode(status) => ApiError::Status {
            endpoint: endpoint.to_string(),
            status,
        },
        other => ApiError::Network {
            endpoint: endpoint.to_string(),
            message: other.to_string(),
        },
    }
}

fn decode_error(endpoint: &str, err: impl std::fmt::Display) -> ApiError {
    ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

//! Remote API surface used by the coordinator.

use async_trait::async_trait;
use rgpl_queue::PendingRecord;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Endpoint that receives drained queue records.
pub const SYNC_PATH: &str = "/api/sync";
/// Endpoint that receives a freshly captured record, and triggers a
/// server-side sync when posted empty.
pub const FORCE_SYNC_PATH: &str = "/api/force-sync";
pub const SYNC_STATUS_PATH: &str = "/api/sync-status";
pub const IMPORT_ZONES_PATH: &str = "/api/import-zones";

/// Where a record is posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Background drain target.
    Sync,
    /// Immediate-send target at capture time.
    ForceSync,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Sync => SYNC_PATH,
            Endpoint::ForceSync => FORCE_SYNC_PATH,
        }
    }
}

/// Response of `GET /api/sync-status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub pending: Vec<ServerPending>,
}

/// One record the server still has pending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPending {
    #[serde(default)]
    pub nom: String,
    #[serde(default)]
    pub quartier: String,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceSyncResponse {
    #[serde(default)]
    pub message: String,
}

/// Response of `POST /api/import-zones`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneImport {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub zones: Vec<ImportedZone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedZone {
    #[serde(default)]
    pub geojson: serde_json::Value,
}

/// Client for the sync server.
///
/// Implementations never panic on transport failure; every error is an
/// [`ApiError`] the coordinator logs and swallows.
#[async_trait]
pub trait SyncApi: Send + Sync + 'static {
    /// POST one record as JSON. Returns the response body, or `Null` when the
    /// body is empty.
    async fn post_record(
        &self,
        endpoint: Endpoint,
        record: &PendingRecord,
    ) -> Result<serde_json::Value, ApiError>;

    /// POST an empty body to the force-sync endpoint.
    async fn force_sync(&self) -> Result<ForceSyncResponse, ApiError>;

    async fn sync_status(&self) -> Result<SyncStatus, ApiError>;

    /// Upload a zone file as multipart form data under the part `file`.
    async fn import_zones(
        &self,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<ZoneImport, ApiError>;

    /// Whether the server answers at all. Any HTTP status counts as reachable.
    async fn probe(&self) -> bool;
}

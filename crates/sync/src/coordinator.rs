//! Capture, immediate send, queue drain, and status for one client.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rgpl_queue::{PendingRecord, QueueError, QueueStore, RecordKey};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::api::{Endpoint, SyncApi, ZoneImport};
use crate::connectivity::ConnectionMonitor;
use crate::encode::materialize;
use crate::error::CaptureError;
use crate::form::{guess_mime, FormSubmission};
use crate::notify::{
    LogNotifier, Notifier, FORCE_SYNC_FAILED_ALERT, NO_ZONE_FILE_ALERT, ZONES_IMPORTED_ALERT,
    ZONES_IMPORT_FAILED_ALERT,
};
use crate::status::{local_rows, server_rows, RenderedStatus, Section};

/// Result of the best-effort immediate send.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The server accepted the record; carries the response body.
    Delivered(serde_json::Value),
    Failed(String),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered(_))
    }
}

/// What happened to a captured record.
#[derive(Debug)]
pub struct CaptureReceipt {
    pub record: PendingRecord,
    /// Key assigned by the queue, or why the record could not be queued.
    pub queued: Result<RecordKey, QueueError>,
    pub sent: SendOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Keys in the order their delivery was attempted.
    pub attempted: Vec<RecordKey>,
    pub delivered: usize,
    pub failed: usize,
    pub cleared: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// The queue could not be read or cleared.
    CompletedWithError { report: DrainReport, error: String },
}

impl DrainOutcome {
    pub fn report(&self) -> &DrainReport {
        match self {
            DrainOutcome::Completed(report) => report,
            DrainOutcome::CompletedWithError { report, .. } => report,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DrainOutcome::Completed(_) => None,
            DrainOutcome::CompletedWithError { error, .. } => Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForceSyncOutcome {
    Synced {
        message: String,
        status: RenderedStatus,
    },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ZoneImportOutcome {
    NoFile,
    Imported(ZoneImport),
    Failed(String),
}

/// Anything that can empty the offline queue towards the server.
///
/// The background worker holds one of these and calls it on `sync-pending`.
#[async_trait]
pub trait Drain: Send + Sync + 'static {
    async fn drain(&self) -> DrainOutcome;
}

/// Orchestrates the queue store and the remote API.
pub struct SyncCoordinator {
    store: Arc<dyn QueueStore>,
    api: Arc<dyn SyncApi>,
    notifier: Arc<dyn Notifier>,
    connection: ConnectionMonitor,
}

impl SyncCoordinator {
    pub fn new(store: Arc<dyn QueueStore>, api: Arc<dyn SyncApi>) -> Self {
        SyncCoordinator {
            store,
            api,
            notifier: Arc::new(LogNotifier),
            connection: ConnectionMonitor::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionMonitor) -> Self {
        self.connection = connection;
        self
    }

    pub fn connection(&self) -> &ConnectionMonitor {
        &self.connection
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    pub fn api(&self) -> &Arc<dyn SyncApi> {
        &self.api
    }

    /// Materialize a form, then queue it and send it at the same time.
    ///
    /// Both steps always run. A queued record that was also delivered will be
    /// sent again by the next drain.
    pub async fn capture(&self, form: FormSubmission) -> Result<CaptureReceipt, CaptureError> {
        let record = materialize(form).await?;
        let (queued, sent) = tokio::join!(self.persist(&record), self.attempt_send(&record));
        Ok(CaptureReceipt {
            record,
            queued,
            sent,
        })
    }

    async fn persist(&self, record: &PendingRecord) -> Result<RecordKey, QueueError> {
        match self.store.add(record).await {
            Ok(key) => {
                info!(key = %key, fields = record.len(), "record queued locally");
                Ok(key)
            }
            Err(e) => {
                error!(error = %e, "could not queue record locally");
                Err(e)
            }
        }
    }

    /// POST one record to the immediate-send endpoint. Never touches the queue.
    pub async fn attempt_send(&self, record: &PendingRecord) -> SendOutcome {
        match self.api.post_record(Endpoint::ForceSync, record).await {
            Ok(body) => {
                info!("record delivered to server");
                SendOutcome::Delivered(body)
            }
            Err(e) => {
                warn!(error = %e, "immediate send failed, record stays queued");
                SendOutcome::Failed(e.to_string())
            }
        }
    }

    /// Post every queued record to `/api/sync`, then clear the queue.
    ///
    /// Records are sent one at a time in insertion order, each POST awaited
    /// before the next is sent. The clear happens whatever the results, so a
    /// record that failed is dropped. A record queued after the queue was
    /// read is never attempted and is dropped by the same clear.
    pub async fn drain(&self) -> DrainOutcome {
        let mut report = DrainReport::default();

        let snapshot = match self.store.list_all().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "drain could not read the queue");
                return DrainOutcome::CompletedWithError {
                    report,
                    error: e.to_string(),
                };
            }
        };
        info!(records = snapshot.len(), "draining queue");

        for row in snapshot.iter() {
            let (key, record) = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(error = %e, "skipping undecodable queued record");
                    report.failed += 1;
                    continue;
                }
            };
            report.attempted.push(key);
            match self.api.post_record(Endpoint::Sync, &record).await {
                Ok(_) => {
                    debug!(key = %key, "queued record synced");
                    report.delivered += 1;
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "sync failed for queued record");
                    report.failed += 1;
                }
            }
        }

        match self.store.clear_all().await {
            Ok(cleared) => {
                report.cleared = cleared;
                info!(
                    delivered = report.delivered,
                    failed = report.failed,
                    cleared,
                    "drain finished"
                );
                DrainOutcome::Completed(report)
            }
            Err(e) => {
                error!(error = %e, "drain could not clear the queue");
                DrainOutcome::CompletedWithError {
                    report,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Merge the local queue and the server pending list.
    pub async fn refresh_status(&self) -> RenderedStatus {
        let (local, remote) = tokio::join!(self.store.list_all(), self.api.sync_status());

        let local = match local {
            Ok(snapshot) => Section::Rows(local_rows(&snapshot)),
            Err(e) => {
                warn!(error = %e, "could not load local pending records");
                Section::Unavailable(e.to_string())
            }
        };

        let (connection, server) = match remote {
            Ok(status) => (status.status.clone(), Section::Rows(server_rows(&status.pending))),
            Err(e) => {
                warn!(error = %e, "could not load server pending records");
                (
                    self.connection.current().label().to_string(),
                    Section::Unavailable(e.to_string()),
                )
            }
        };

        RenderedStatus {
            connection,
            local,
            server,
        }
    }

    /// Ask the server to run its own sync, then refresh the status.
    pub async fn force_sync(&self) -> ForceSyncOutcome {
        match self.api.force_sync().await {
            Ok(response) => {
                info!(message = %response.message, "force sync accepted");
                self.notifier.alert(&response.message);
                let status = self.refresh_status().await;
                ForceSyncOutcome::Synced {
                    message: response.message,
                    status,
                }
            }
            Err(e) => {
                error!(error = %e, "force sync failed");
                self.notifier.alert(FORCE_SYNC_FAILED_ALERT);
                ForceSyncOutcome::Failed(e.to_string())
            }
        }
    }

    /// Upload a CSV or Excel zone file.
    pub async fn import_zones(&self, path: Option<&Path>) -> ZoneImportOutcome {
        let Some(path) = path.filter(|p| p.is_file()) else {
            self.notifier.alert(NO_ZONE_FILE_ALERT);
            return ZoneImportOutcome::NoFile;
        };

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(path = %path.display(), error = %e, "could not read zone file");
                self.notifier.alert(ZONES_IMPORT_FAILED_ALERT);
                return ZoneImportOutcome::Failed(e.to_string());
            }
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        match self
            .api
            .import_zones(&file_name, guess_mime(path), bytes)
            .await
        {
            Ok(import) => {
                info!(file = %file_name, zones = import.zones.len(), "zones imported");
                let message = import
                    .message
                    .as_deref()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(ZONES_IMPORTED_ALERT);
                self.notifier.alert(message);
                ZoneImportOutcome::Imported(import)
            }
            Err(e) => {
                error!(file = %file_name, error = %e, "zone import failed");
                self.notifier.alert(ZONES_IMPORT_FAILED_ALERT);
                ZoneImportOutcome::Failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl Drain for SyncCoordinator {
    async fn drain(&self) -> DrainOutcome {
        SyncCoordinator::drain(self).await
    }
}

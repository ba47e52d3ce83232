//! Coordinator behavior against an in-memory queue and a scripted API.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rgpl_queue::{
    FieldValue, MemoryQueue, PendingRecord, QueueError, QueueSnapshot, QueueStore, RecordKey,
};
use rgpl_sync::notify::{
    FORCE_SYNC_FAILED_ALERT, NO_ZONE_FILE_ALERT, ZONES_IMPORTED_ALERT, ZONES_IMPORT_FAILED_ALERT,
};
use rgpl_sync::{
    ApiError, ConnectionMonitor, ConnectionState, DrainOutcome, Endpoint, FileField,
    ForceSyncOutcome, ForceSyncResponse, FormSubmission, ImportedZone, Notifier, Section,
    SendOutcome, ServerPending, SyncApi, SyncCoordinator, SyncStatus, ZoneImport,
    ZoneImportOutcome,
};

// ──────────────────────────────────────────────
// Test doubles
// ──────────────────────────────────────────────

#[derive(Default)]
struct ScriptedApi {
    posts: Mutex<Vec<(Endpoint, PendingRecord)>>,
    uploads: Mutex<Vec<(String, String, usize)>>,
    offline: bool,
    /// Records whose `nom` is listed here are rejected with HTTP 500.
    reject_noms: Vec<String>,
    status: SyncStatus,
    /// When set, every record POST sleeps this long before answering.
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedApi {
    fn online() -> Self {
        Self::default()
    }

    fn offline() -> Self {
        ScriptedApi {
            offline: true,
            ..Self::default()
        }
    }

    fn network_error(endpoint: &str) -> ApiError {
        ApiError::Network {
            endpoint: endpoint.to_string(),
            message: "connection refused".to_string(),
        }
    }

    fn posts(&self) -> Vec<(Endpoint, PendingRecord)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncApi for ScriptedApi {
    async fn post_record(
        &self,
        endpoint: Endpoint,
        record: &PendingRecord,
    ) -> Result<serde_json::Value, ApiError> {
        self.posts.lock().unwrap().push((endpoint, record.clone()));
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.offline {
            return Err(Self::network_error(endpoint.path()));
        }
        let nom = record.text("nom").unwrap_or_default().to_string();
        if self.reject_noms.contains(&nom) {
            return Err(ApiError::Status {
                endpoint: endpoint.path().to_string(),
                status: 500,
            });
        }
        Ok(serde_json::json!({"ok": true}))
    }

    async fn force_sync(&self) -> Result<ForceSyncResponse, ApiError> {
        if self.offline {
            return Err(Self::network_error("/api/force-sync"));
        }
        Ok(ForceSyncResponse {
            message: "Synchronisation forcée lancée 🚀".to_string(),
        })
    }

    async fn sync_status(&self) -> Result<SyncStatus, ApiError> {
        if self.offline {
            return Err(Self::network_error("/api/sync-status"));
        }
        Ok(self.status.clone())
    }

    async fn import_zones(
        &self,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<ZoneImport, ApiError> {
        self.uploads
            .lock()
            .unwrap()
            .push((file_name.to_string(), mime.to_string(), bytes.len()));
        if self.offline {
            return Err(Self::network_error("/api/import-zones"));
        }
        Ok(ZoneImport {
            message: None,
            zones: vec![ImportedZone {
                geojson: serde_json::json!({"type": "Polygon", "coordinates": []}),
            }],
        })
    }

    async fn probe(&self) -> bool {
        !self.offline
    }
}

/// A store whose backing file cannot be opened.
struct UnavailableStore;

impl UnavailableStore {
    fn error() -> QueueError {
        QueueError::StorageUnavailable {
            location: "/readonly/rgpl-db.sqlite3".to_string(),
            reason: "permission denied".to_string(),
        }
    }
}

#[async_trait]
impl QueueStore for UnavailableStore {
    async fn add(&self, _record: &PendingRecord) -> Result<RecordKey, QueueError> {
        Err(Self::error())
    }

    async fn list_all(&self) -> Result<QueueSnapshot, QueueError> {
        Err(Self::error())
    }

    async fn clear_all(&self) -> Result<usize, QueueError> {
        Err(Self::error())
    }
}

#[derive(Default)]
struct RecordingNotifier {
    alerts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
}

fn coordinator(store: Arc<dyn QueueStore>, api: Arc<ScriptedApi>) -> SyncCoordinator {
    SyncCoordinator::new(store, api)
}

fn family(nom: &str, quartier: &str) -> FormSubmission {
    FormSubmission::new()
        .text("nom", nom)
        .text("quartier", quartier)
}

// ──────────────────────────────────────────────
// capture / attempt_send
// ──────────────────────────────────────────────

#[tokio::test]
async fn offline_capture_is_queued_then_drained_after_reconnect() {
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueue::new());

    let offline = Arc::new(ScriptedApi::offline());
    let receipt = coordinator(store.clone(), offline.clone())
        .capture(family("Dupont", "Nord"))
        .await
        .unwrap();
    assert!(receipt.queued.is_ok());
    assert!(matches!(receipt.sent, SendOutcome::Failed(_)));

    let snapshot = store.list_all().await.unwrap();
    let records = snapshot.into_records().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].1.len(), 2);
    assert_eq!(records[0].1.text("nom"), Some("Dupont"));
    assert_eq!(records[0].1.text("quartier"), Some("Nord"));

    let online = Arc::new(ScriptedApi::online());
    let outcome = coordinator(store.clone(), online.clone()).drain().await;
    assert_eq!(outcome.report().delivered, 1);
    assert_eq!(outcome.report().cleared, 1);
    let posts = online.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, Endpoint::Sync);
    assert_eq!(store.len().await.unwrap(), 0);
}

#[tokio::test]
async fn delivered_capture_is_still_queued() {
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueue::new());
    let api = Arc::new(ScriptedApi::online());
    let receipt = coordinator(store.clone(), api.clone())
        .capture(family("Mba", "Sud"))
        .await
        .unwrap();

    assert!(receipt.sent.is_delivered());
    assert_eq!(receipt.queued.unwrap(), RecordKey(1));
    assert_eq!(store.len().await.unwrap(), 1);
    let posts = api.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, Endpoint::ForceSync);
    assert_eq!(posts[0].1, receipt.record);
}

#[tokio::test]
async fn unavailable_store_still_attempts_send() {
    let api = Arc::new(ScriptedApi::online());
    let receipt = coordinator(Arc::new(UnavailableStore), api.clone())
        .capture(family("Obame", "Est"))
        .await
        .unwrap();
    assert!(matches!(
        receipt.queued,
        Err(QueueError::StorageUnavailable { .. })
    ));
    assert!(receipt.sent.is_delivered());
    assert_eq!(api.posts().len(), 1);
}

#[tokio::test]
async fn quota_exceeded_is_reported_and_nothing_queued() {
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueue::with_quota(8));
    let receipt = coordinator(store.clone(), Arc::new(ScriptedApi::offline()))
        .capture(family("Nguema", "Ouest"))
        .await
        .unwrap();
    assert!(matches!(
        receipt.queued,
        Err(QueueError::StorageQuotaExceeded { .. })
    ));
    assert_eq!(store.len().await.unwrap(), 0);
}

#[tokio::test]
async fn captured_file_survives_the_queue() {
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueue::new());
    let bytes: Vec<u8> = (0u8..=255).collect();
    let form = family("Ella", "Centre")
        .file("photo", FileField::from_bytes("maison.png", "image/png", bytes.clone()))
        .file("piece", FileField::empty());
    coordinator(store.clone(), Arc::new(ScriptedApi::offline()))
        .capture(form)
        .await
        .unwrap();

    let records = store.list_all().await.unwrap().into_records().unwrap();
    let record = &records[0].1;
    let photo = record.get("photo").and_then(FieldValue::as_file).unwrap();
    assert_eq!(photo.name, "maison.png");
    assert_eq!(photo.mime, "image/png");
    assert_eq!(photo.decode().unwrap(), bytes);
    assert_eq!(record.text("piece"), Some(""));
}

#[tokio::test]
async fn unreadable_file_stores_and_sends_nothing() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueue::new());
    let api = Arc::new(ScriptedApi::online());
    let form = family("Ella", "Centre").file("photo", FileField::from_path(tmp.path().join("gone.png")));
    let result = coordinator(store.clone(), api.clone()).capture(form).await;
    assert!(result.is_err());
    assert_eq!(store.len().await.unwrap(), 0);
    assert!(api.posts().is_empty());
}

// ──────────────────────────────────────────────
// drain
// ──────────────────────────────────────────────

#[tokio::test]
async fn drain_attempts_every_record_and_clears_even_failures() {
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueue::new());
    for nom in ["A", "B", "C"] {
        let record: PendingRecord = [("nom", nom)].into_iter().collect();
        store.add(&record).await.unwrap();
    }
    let api = Arc::new(ScriptedApi {
        reject_noms: vec!["B".to_string()],
        ..ScriptedApi::default()
    });

    let outcome = coordinator(store.clone(), api.clone()).drain().await;
    let DrainOutcome::Completed(report) = outcome else {
        panic!("drain should complete");
    };
    assert_eq!(report.attempted, vec![RecordKey(1), RecordKey(2), RecordKey(3)]);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.cleared, 3);
    assert_eq!(store.len().await.unwrap(), 0);

    let posted: Vec<String> = api
        .posts()
        .iter()
        .map(|(endpoint, r)| {
            assert_eq!(*endpoint, Endpoint::Sync);
            r.text("nom").unwrap().to_string()
        })
        .collect();
    assert_eq!(posted, vec!["A", "B", "C"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn drain_sends_one_record_at_a_time() {
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueue::new());
    let noms: Vec<String> = (1..=12).map(|i| format!("famille-{i}")).collect();
    for nom in &noms {
        let record: PendingRecord = [("nom", nom.as_str())].into_iter().collect();
        store.add(&record).await.unwrap();
    }
    let api = Arc::new(ScriptedApi {
        latency: Some(Duration::from_millis(5)),
        ..ScriptedApi::default()
    });

    let outcome = coordinator(store.clone(), api.clone()).drain().await;
    assert_eq!(outcome.report().delivered, 12);
    assert_eq!(api.max_in_flight.load(Ordering::SeqCst), 1);

    let posted: Vec<String> = api
        .posts()
        .iter()
        .map(|(_, r)| r.text("nom").unwrap().to_string())
        .collect();
    assert_eq!(posted, noms);
}

#[tokio::test]
async fn drain_of_empty_queue_posts_nothing() {
    let api = Arc::new(ScriptedApi::online());
    let outcome = coordinator(Arc::new(MemoryQueue::new()), api.clone())
        .drain()
        .await;
    assert_eq!(outcome, DrainOutcome::Completed(Default::default()));
    assert!(api.posts().is_empty());
}

#[tokio::test]
async fn drain_reports_unreadable_store() {
    let outcome = coordinator(Arc::new(UnavailableStore), Arc::new(ScriptedApi::online()))
        .drain()
        .await;
    assert!(matches!(outcome, DrainOutcome::CompletedWithError { .. }));
    assert!(outcome.error().unwrap().contains("permission denied"));
}

// ──────────────────────────────────────────────
// status / force sync / zones
// ──────────────────────────────────────────────

#[tokio::test]
async fn status_merges_local_and_server_rows() {
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueue::new());
    let record: PendingRecord = [("nom", "Dupont"), ("quartier", "Nord")].into_iter().collect();
    store.add(&record).await.unwrap();
    let api = Arc::new(ScriptedApi {
        status: SyncStatus {
            status: "Connecté ✅".to_string(),
            pending: vec![ServerPending {
                nom: "Mba".to_string(),
                quartier: "Sud".to_string(),
                date: "2024-05-01".to_string(),
            }],
        },
        ..ScriptedApi::default()
    });

    let status = coordinator(store, api).refresh_status().await;
    assert_eq!(status.connection, "Connecté ✅");
    let labels: Vec<&str> = status.rows().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["L1", "S1"]);
    assert_eq!(status.local.rows()[0].nom, "Dupont");
    assert_eq!(status.server.rows()[0].date, "2024-05-01");
}

#[tokio::test]
async fn status_degrades_to_local_when_server_unreachable() {
    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueue::new());
    let record: PendingRecord = [("nom", "Dupont")].into_iter().collect();
    store.add(&record).await.unwrap();
    let coordinator = coordinator(store, Arc::new(ScriptedApi::offline()))
        .with_connection(ConnectionMonitor::new(ConnectionState::Offline));

    let status = coordinator.refresh_status().await;
    assert_eq!(status.connection, "🔴 Hors ligne");
    assert_eq!(status.local.rows().len(), 1);
    assert!(!status.server.is_available());
}

#[tokio::test]
async fn status_degrades_to_server_when_store_unavailable() {
    let status = coordinator(Arc::new(UnavailableStore), Arc::new(ScriptedApi::online()))
        .refresh_status()
        .await;
    assert!(matches!(status.local, Section::Unavailable(_)));
    assert!(status.server.is_available());
}

#[tokio::test]
async fn force_sync_alerts_message_and_refreshes() {
    let notifier = Arc::new(RecordingNotifier::default());
    let outcome = coordinator(Arc::new(MemoryQueue::new()), Arc::new(ScriptedApi::online()))
        .with_notifier(notifier.clone())
        .force_sync()
        .await;
    let ForceSyncOutcome::Synced { message, status } = outcome else {
        panic!("expected success");
    };
    assert_eq!(message, "Synchronisation forcée lancée 🚀");
    assert!(status.server.is_available());
    assert_eq!(notifier.alerts(), vec![message]);
}

#[tokio::test]
async fn force_sync_failure_alerts_user() {
    let notifier = Arc::new(RecordingNotifier::default());
    let outcome = coordinator(Arc::new(MemoryQueue::new()), Arc::new(ScriptedApi::offline()))
        .with_notifier(notifier.clone())
        .force_sync()
        .await;
    assert!(matches!(outcome, ForceSyncOutcome::Failed(_)));
    assert_eq!(notifier.alerts(), vec![FORCE_SYNC_FAILED_ALERT.to_string()]);
}

#[tokio::test]
async fn import_zones_without_file_asks_for_one() {
    let notifier = Arc::new(RecordingNotifier::default());
    let api = Arc::new(ScriptedApi::online());
    let coordinator =
        coordinator(Arc::new(MemoryQueue::new()), api.clone()).with_notifier(notifier.clone());

    assert_eq!(coordinator.import_zones(None).await, ZoneImportOutcome::NoFile);
    assert_eq!(
        coordinator
            .import_zones(Some(Path::new("/nonexistent/zones.csv")))
            .await,
        ZoneImportOutcome::NoFile
    );
    assert_eq!(notifier.alerts(), vec![NO_ZONE_FILE_ALERT; 2]);
    assert!(api.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn import_zones_uploads_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("zones.csv");
    std::fs::write(&path, "zone,quartier\nZ1,Nord\n").unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let api = Arc::new(ScriptedApi::online());
    let outcome = coordinator(Arc::new(MemoryQueue::new()), api.clone())
        .with_notifier(notifier.clone())
        .import_zones(Some(&path))
        .await;

    let ZoneImportOutcome::Imported(import) = outcome else {
        panic!("expected import");
    };
    assert_eq!(import.zones.len(), 1);
    assert_eq!(notifier.alerts(), vec![ZONES_IMPORTED_ALERT.to_string()]);
    let uploads = api.uploads.lock().unwrap().clone();
    assert_eq!(uploads, vec![("zones.csv".to_string(), "text/csv".to_string(), 22)]);
}

#[tokio::test]
async fn import_zones_failure_alerts_user() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("zones.xlsx");
    std::fs::write(&path, b"PK").unwrap();

    let notifier = Arc::new(RecordingNotifier::default());
    let outcome = coordinator(Arc::new(MemoryQueue::new()), Arc::new(ScriptedApi::offline()))
        .with_notifier(notifier.clone())
        .import_zones(Some(&path))
        .await;
    assert!(matches!(outcome, ZoneImportOutcome::Failed(_)));
    assert_eq!(notifier.alerts(), vec![ZONES_IMPORT_FAILED_ALERT.to_string()]);
}

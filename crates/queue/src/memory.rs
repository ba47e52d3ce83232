//! In-process queue with the same contract as the SQLite backend.
//!
//! Nothing survives the process. Used for `--ephemeral` runs and tests.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::QueueError;
use crate::record::{PendingRecord, RecordKey};
use crate::snapshot::QueueSnapshot;
use crate::traits::QueueStore;

#[derive(Debug, Default)]
struct Inner {
    last_key: i64,
    rows: Vec<(RecordKey, String)>,
    bytes: u64,
}

/// Non-durable [`QueueStore`].
#[derive(Debug, Default)]
pub struct MemoryQueue {
    inner: Mutex<Inner>,
    max_bytes: Option<u64>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(max_bytes: u64) -> Self {
        MemoryQueue {
            inner: Mutex::new(Inner::default()),
            max_bytes: Some(max_bytes),
        }
    }
}

#[async_trait]
impl QueueStore for MemoryQueue {
    async fn add(&self, record: &PendingRecord) -> Result<RecordKey, QueueError> {
        let payload = record.to_payload()?;
        let size = payload.len() as u64;
        let mut inner = self.inner.lock().await;
        if let Some(limit) = self.max_bytes {
            if inner.bytes + size > limit {
                return Err(QueueError::StorageQuotaExceeded {
                    requested: size,
                    reason: format!("{} bytes already queued, limit is {limit}", inner.bytes),
                });
            }
        }
        inner.last_key += 1;
        let key = RecordKey(inner.last_key);
        inner.rows.push((key, payload));
        inner.bytes += size;
        Ok(key)
    }

    async fn list_all(&self) -> Result<QueueSnapshot, QueueError> {
        let inner = self.inner.lock().await;
        Ok(QueueSnapshot::from_rows(inner.rows.clone()))
    }

    async fn clear_all(&self) -> Result<usize, QueueError> {
        let mut inner = self.inner.lock().await;
        let removed = inner.rows.len();
        inner.rows.clear();
        inner.bytes = 0;
        Ok(removed)
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.inner.lock().await.rows.len())
    }
}

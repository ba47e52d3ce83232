use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::error::QueueError;
use crate::record::{PendingRecord, RecordKey};
use crate::snapshot::QueueSnapshot;
use crate::sqlite::{QueueOptions, SqliteQueue};
use crate::traits::QueueStore;

/// A [`SqliteQueue`] opened on first use.
///
/// A failed open is not remembered: every operation retries it and reports
/// the open error (usually `StorageUnavailable`) until it succeeds.
pub struct LazyQueue {
    options: QueueOptions,
    cell: OnceCell<SqliteQueue>,
}

impl LazyQueue {
    pub fn new(options: QueueOptions) -> Self {
        LazyQueue {
            options,
            cell: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    pub fn is_open(&self) -> bool {
        self.cell.initialized()
    }

    /// The opened handle, opening it if needed.
    pub async fn handle(&self) -> Result<&SqliteQueue, QueueError> {
        self.cell
            .get_or_try_init(|| SqliteQueue::open(self.options.clone()))
            .await
            .inspect_err(|e| warn!(error = %e, "queue open failed"))
    }
}

#[async_trait]
impl QueueStore for LazyQueue {
    async fn add(&self, record: &PendingRecord) -> Result<RecordKey, QueueError> {
        self.handle().await?.add(record).await
    }

    async fn list_all(&self) -> Result<QueueSnapshot, QueueError> {
        self.handle().await?.list_all().await
    }

    async fn clear_all(&self) -> Result<usize, QueueError> {
        self.handle().await?.clear_all().await
    }

    async fn len(&self) -> Result<usize, QueueError> {
        self.handle().await?.len().await
    }
}

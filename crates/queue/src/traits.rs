use async_trait::async_trait;

use crate::error::QueueError;
use crate::record::{PendingRecord, RecordKey};
use crate::snapshot::QueueSnapshot;

/// The storage trait for the offline record queue.
///
/// A `QueueStore` holds one durable collection of [`PendingRecord`]s awaiting
/// upload. Both the capture path and the background drain use the same
/// collection, possibly from different processes.
///
/// ## Batch Semantics
///
/// Records are only ever appended one at a time with [`add`](QueueStore::add)
/// and removed all at once with [`clear_all`](QueueStore::clear_all). There is
/// no per-record acknowledgment.
///
/// ## Isolation
///
/// - `list_all` is a snapshot read: concurrent `add` calls are either fully
///   visible in the snapshot or not at all.
/// - `clear_all` is atomic: an `add` racing a clear is either removed by it
///   or survives it intact.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a handle can be shared
/// across async tasks as `Arc<dyn QueueStore>`.
#[async_trait]
pub trait QueueStore: Send + Sync + 'static {
    /// Append a record and return the key assigned to it.
    ///
    /// Returns `Err(QueueError::StorageQuotaExceeded)` when the record does
    /// not fit; in that case nothing was queued.
    async fn add(&self, record: &PendingRecord) -> Result<RecordKey, QueueError>;

    /// Read every queued record, ordered by insertion.
    async fn list_all(&self) -> Result<QueueSnapshot, QueueError>;

    /// Remove every queued record. Returns the number of records removed.
    async fn clear_all(&self) -> Result<usize, QueueError>;

    /// Number of queued records.
    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.list_all().await?.len())
    }
}

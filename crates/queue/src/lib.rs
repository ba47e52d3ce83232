pub mod conformance;
mod error;
mod lazy;
mod memory;
mod record;
mod snapshot;
mod sqlite;
mod traits;

pub use error::QueueError;
pub use lazy::LazyQueue;
pub use memory::MemoryQueue;
pub use record::{DataUrlError, EncodedFile, FieldValue, PendingRecord, RecordKey, FALLBACK_MIME};
pub use snapshot::{QueueSnapshot, SnapshotIter};
pub use sqlite::{QueueOptions, SqliteQueue, DB_FILE_NAME, SCHEMA_VERSION};
pub use traits::QueueStore;

/// All errors that can be returned by a QueueStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The host denied persistent storage: the data directory could not be
    /// created or the database could not be opened.
    #[error("persistent storage unavailable at {location}: {reason}")]
    StorageUnavailable { location: String, reason: String },

    /// Adding the record would exceed the configured quota, or the disk is full.
    /// The record was not queued.
    #[error("storage quota exceeded adding {requested} bytes: {reason}")]
    StorageQuotaExceeded { requested: u64, reason: String },

    /// The store was opened with a schema version lower than the one on disk.
    #[error("queue schema version {requested} is older than stored version {stored}")]
    VersionDowngrade { stored: u32, requested: u32 },

    /// Schema versions start at 1.
    #[error("invalid queue schema version {0}")]
    InvalidVersion(u32),

    /// A queued payload could not be decoded back into a record.
    #[error("queued record {key} is corrupt: {reason}")]
    Corrupt { key: i64, reason: String },

    /// A backend-specific storage error (SQL failure, serialization, task join).
    #[error("queue backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for QueueError {
    fn from(e: serde_json::Error) -> Self {
        QueueError::Backend(format!("serialization failed: {e}"))
    }
}

//! Sync coordinator for the rgpl offline client.
//!
//! Captures form submissions into [`PendingRecord`](rgpl_queue::PendingRecord)s,
//! sends them immediately when possible, queues them in a
//! [`QueueStore`](rgpl_queue::QueueStore) regardless, and drains the queue to
//! the server on reconnect.

pub mod api;
pub mod connectivity;
pub mod coordinator;
pub mod encode;
pub mod error;
pub mod form;
pub mod http;
pub mod notify;
pub mod status;

pub use api::{
    Endpoint, ForceSyncResponse, ImportedZone, ServerPending, SyncApi, SyncStatus, ZoneImport,
};
pub use connectivity::{ConnectionMonitor, ConnectionState, Transition};
pub use coordinator::{
    CaptureReceipt, Drain, DrainOutcome, DrainReport, ForceSyncOutcome, SendOutcome,
    SyncCoordinator, ZoneImportOutcome,
};
pub use error::{ApiError, CaptureError};
pub use form::{FileField, FileSource, FormEntry, FormSubmission};
pub use http::HttpSyncApi;
pub use notify::{LogNotifier, Notifier};
pub use status::{RenderedStatus, Section, StatusRow};

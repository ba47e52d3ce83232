//! Background context of the rgpl client.
//!
//! Owns the versioned offline asset cache ([`CacheManager`]) and dispatches
//! named events to it. The `sync-pending` event drains the offline queue
//! through any [`Drain`](rgpl_sync::Drain) implementation.

pub mod clients;
pub mod error;
pub mod events;
pub mod fetch;
pub mod lifecycle;
pub mod manifest;
pub mod snapshot;
pub mod watcher;
pub mod worker;

pub use clients::{ClientId, ClientRegistry};
pub use error::WorkerError;
pub use events::{EventOutcome, EventTicket, WaitUntil, WorkerEvent, SYNC_PENDING_TAG};
pub use fetch::{AssetFetcher, CachedResponse, FetchError, HttpAssetFetcher};
pub use lifecycle::{ActivationReport, CacheManager, CacheState, FetchDisposition, InstallReport};
pub use manifest::{AssetManifest, CACHE_NAME, DEFAULT_OFFLINE_PATHS};
pub use snapshot::{FsSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use watcher::ConnectivityWatcher;
pub use worker::{BackgroundWorker, WorkerHandle};

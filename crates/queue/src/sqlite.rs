//! SQLite-backed durable queue.
//!
//! One database file holds the `pending` table. The schema version lives in
//! `PRAGMA user_version` and is raised by additive migrations on open.
//!
//! WAL mode plus a busy timeout lets the page context and the background
//! worker open the same file concurrently. Reads run inside a deferred
//! transaction (snapshot), writes inside an immediate one.
//!
//! `rusqlite` is blocking, so every call runs on the blocking pool via
//! `tokio::task::spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, TransactionBehavior};
use tracing::{debug, info};

use crate::error::QueueError;
use crate::record::{PendingRecord, RecordKey};
use crate::snapshot::QueueSnapshot;
use crate::traits::QueueStore;

/// File name of the queue database inside the data directory.
pub const DB_FILE_NAME: &str = "rgpl-db.sqlite3";

/// Schema version this build expects.
pub const SCHEMA_VERSION: u32 = 1;

/// Additive migrations, applied in order for every version above the stored one.
const MIGRATIONS: &[(u32, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS pending (
        key INTEGER PRIMARY KEY AUTOINCREMENT,
        payload TEXT NOT NULL,
        size INTEGER NOT NULL
    );",
)];

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where and how to open the queue.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub path: PathBuf,
    pub schema_version: u32,
    /// Upper bound on the summed payload size of queued records.
    pub max_bytes: Option<u64>,
}

impl QueueOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        QueueOptions {
            path: path.into(),
            schema_version: SCHEMA_VERSION,
            max_bytes: None,
        }
    }

    /// Options for the default database file inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(DB_FILE_NAME))
    }

    pub fn schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    pub fn max_bytes(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

/// Handle to an opened SQLite queue.
#[derive(Clone)]
pub struct SqliteQueue {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    max_bytes: Option<u64>,
}

impl SqliteQueue {
    /// Open (creating or migrating as needed) the queue described by `options`.
    pub async fn open(options: QueueOptions) -> Result<Self, QueueError> {
        tokio::task::spawn_blocking(move || Self::open_blocking(options))
            .await
            .map_err(|e| QueueError::Backend(format!("task join error: {e}")))?
    }

    fn open_blocking(options: QueueOptions) -> Result<Self, QueueError> {
        let unavailable = |reason: String| QueueError::StorageUnavailable {
            location: options.path.display().to_string(),
            reason,
        };

        if let Some(parent) = options.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| unavailable(format!("cannot create data directory: {e}")))?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let mut conn = Connection::open_with_flags(&options.path, flags)
            .map_err(|e| unavailable(e.to_string()))?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| unavailable(e.to_string()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| unavailable(e.to_string()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| unavailable(e.to_string()))?;

        migrate(&mut conn, options.schema_version)?;

        debug!(path = %options.path.display(), "queue opened");
        Ok(SqliteQueue {
            conn: Arc::new(Mutex::new(conn)),
            path: options.path,
            max_bytes: options.max_bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Schema version currently recorded in the database file.
    pub async fn stored_version(&self) -> Result<u32, QueueError> {
        self.with_conn(|conn| read_user_version(conn)).await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, QueueError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, QueueError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| QueueError::Backend(format!("connection mutex poisoned: {e}")))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| QueueError::Backend(format!("task join error: {e}")))?
    }
}

#[async_trait]
impl QueueStore for SqliteQueue {
    async fn add(&self, record: &PendingRecord) -> Result<RecordKey, QueueError> {
        let payload = record.to_payload()?;
        let size = payload.len() as u64;
        let max_bytes = self.max_bytes;

        self.with_conn(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql)?;

            if let Some(limit) = max_bytes {
                let used: i64 = tx
                    .query_row("SELECT COALESCE(SUM(size), 0) FROM pending", [], |row| {
                        row.get(0)
                    })
                    .map_err(map_sql)?;
                let used = used.max(0) as u64;
                if used + size > limit {
                    return Err(QueueError::StorageQuotaExceeded {
                        requested: size,
                        reason: format!("{used} bytes already queued, limit is {limit}"),
                    });
                }
            }

            tx.execute(
                "INSERT INTO pending (payload, size) VALUES (?1, ?2)",
                params![payload, size as i64],
            )
            .map_err(map_sql)?;
            let key = tx.last_insert_rowid();
            tx.commit().map_err(map_sql)?;
            Ok(RecordKey(key))
        })
        .await
    }

    async fn list_all(&self) -> Result<QueueSnapshot, QueueError> {
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(map_sql)?;
            let rows = {
                let mut stmt = tx
                    .prepare("SELECT key, payload FROM pending ORDER BY key")
                    .map_err(map_sql)?;
                let rows = stmt
                    .query_map([], |row| Ok((RecordKey(row.get(0)?), row.get::<_, String>(1)?)))
                    .map_err(map_sql)?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(map_sql)?;
                rows
            };
            tx.commit().map_err(map_sql)?;
            Ok(QueueSnapshot::from_rows(rows))
        })
        .await
    }

    async fn clear_all(&self) -> Result<usize, QueueError> {
        self.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql)?;
            let removed = tx.execute("DELETE FROM pending", []).map_err(map_sql)?;
            tx.commit().map_err(map_sql)?;
            Ok(removed)
        })
        .await
    }

    async fn len(&self) -> Result<usize, QueueError> {
        self.with_conn(|conn| {
            let n: i64 = conn
                .query_row("SELECT COUNT(*) FROM pending", [], |row| row.get(0))
                .map_err(map_sql)?;
            Ok(n.max(0) as usize)
        })
        .await
    }
}

// ── Schema migration ──────────────────────────────────────────────────────────

fn read_user_version(conn: &Connection) -> Result<u32, QueueError> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .map_err(map_sql)
}

/// Bring the schema up to `requested`.
///
/// Runs inside one immediate transaction so two processes opening the same
/// file after a bump apply each migration once.
fn migrate(conn: &mut Connection, requested: u32) -> Result<(), QueueError> {
    if requested == 0 {
        return Err(QueueError::InvalidVersion(0));
    }

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(map_sql)?;
    let stored = read_user_version(&tx)?;

    if requested < stored {
        return Err(QueueError::VersionDowngrade { stored, requested });
    }
    if requested == stored {
        return Ok(());
    }

    for (version, sql) in MIGRATIONS {
        if *version > stored && *version <= requested {
            tx.execute_batch(sql).map_err(map_sql)?;
            info!(version, "applied queue schema migration");
        }
    }
    tx.pragma_update(None, "user_version", requested)
        .map_err(map_sql)?;
    tx.commit().map_err(map_sql)?;

    info!(from = stored, to = requested, "queue schema upgraded");
    Ok(())
}

fn map_sql(e: rusqlite::Error) -> QueueError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e {
        match err.code {
            ErrorCode::DiskFull => {
                return QueueError::StorageQuotaExceeded {
                    requested: 0,
                    reason: e.to_string(),
                }
            }
            ErrorCode::ReadOnly | ErrorCode::CannotOpen | ErrorCode::PermissionDenied => {
                return QueueError::StorageUnavailable {
                    location: "queue database".to_string(),
                    reason: e.to_string(),
                }
            }
            _ => {}
        }
    }
    QueueError::Backend(e.to_string())
}

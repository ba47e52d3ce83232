use crate::lifecycle::CacheState;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Cache version names become directory names and must be plain.
    #[error("invalid cache version '{0}'")]
    InvalidVersion(String),

    #[error("cache storage error at {path}: {source}")]
    Storage {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache entry at {path}: {message}")]
    CorruptEntry { path: String, message: String },

    #[error("no installed cache named '{0}'")]
    NotInstalled(String),

    #[error("cannot {operation} while cache is {state}")]
    InvalidState {
        state: CacheState,
        operation: &'static str,
    },

    /// Activation would take over pages still controlled by another version.
    #[error("{0} open client(s) still controlled by the previous version; call skip_waiting first")]
    WaitingForClients(usize),

    #[error("background worker has stopped")]
    Stopped,
}

impl WorkerError {
    pub(crate) fn storage(path: &std::path::Path, source: std::io::Error) -> Self {
        WorkerError::Storage {
            path: path.display().to_string(),
            source,
        }
    }
}

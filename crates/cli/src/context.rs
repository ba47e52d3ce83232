//! Per-invocation wiring: runtime, queue, API client, coordinator, cache.

use std::future::Future;
use std::process;
use std::sync::Arc;

use rgpl_queue::{LazyQueue, MemoryQueue, QueueOptions, QueueStore};
use rgpl_sync::{ConnectionMonitor, HttpSyncApi, SyncCoordinator};
use rgpl_worker::{CacheManager, FsSnapshotStore, HttpAssetFetcher};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::config::Config;
use crate::notify::TerminalNotifier;
use crate::{report_error, OutputFormat};

pub(crate) struct AppContext {
    pub config: Config,
    pub output: OutputFormat,
    pub quiet: bool,
    ephemeral: bool,
    runtime: Runtime,
}

impl AppContext {
    pub(crate) fn new(
        config: Config,
        output: OutputFormat,
        quiet: bool,
        ephemeral: bool,
    ) -> Result<Self, String> {
        let runtime =
            Runtime::new().map_err(|e| format!("failed to create tokio runtime: {}", e))?;
        Ok(AppContext {
            config,
            output,
            quiet,
            ephemeral,
            runtime,
        })
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Report `msg` and exit with status 1.
    pub(crate) fn fail(&self, msg: &str) -> ! {
        report_error(msg, self.output, self.quiet);
        process::exit(1);
    }

    pub(crate) fn is_json(&self) -> bool {
        self.output == OutputFormat::Json
    }

    /// Text output, unless `--quiet`.
    pub(crate) fn say(&self, line: &str) {
        if !self.quiet {
            println!("{}", line);
        }
    }

    /// The queue for this run. Opening is deferred to first use, so an
    /// unusable data directory surfaces as `StorageUnavailable` per call.
    pub(crate) fn queue(&self) -> Arc<dyn QueueStore> {
        if self.ephemeral {
            debug!("using an in-memory queue");
            return match self.config.queue.max_bytes {
                Some(max) => Arc::new(MemoryQueue::with_quota(max)),
                None => Arc::new(MemoryQueue::new()),
            };
        }
        let options = QueueOptions::in_dir(&self.config.data_dir)
            .schema_version(self.config.queue.schema_version)
            .max_bytes(self.config.queue.max_bytes);
        Arc::new(LazyQueue::new(options))
    }

    pub(crate) fn api(&self) -> Arc<HttpSyncApi> {
        Arc::new(
            HttpSyncApi::new(&self.config.server_url)
                .with_auth_token(self.config.auth_token.clone())
                .with_timeout(self.config.request_timeout()),
        )
    }

    pub(crate) fn coordinator(&self) -> SyncCoordinator {
        self.coordinator_with(self.queue(), ConnectionMonitor::default())
    }

    pub(crate) fn coordinator_with(
        &self,
        queue: Arc<dyn QueueStore>,
        connection: ConnectionMonitor,
    ) -> SyncCoordinator {
        SyncCoordinator::new(queue, self.api())
            .with_notifier(Arc::new(TerminalNotifier::new(self.output, self.quiet)))
            .with_connection(connection)
    }

    pub(crate) fn cache_manager(&self) -> CacheManager {
        let store = FsSnapshotStore::new(self.config.cache_dir());
        let fetcher =
            HttpAssetFetcher::new(&self.config.server_url).with_timeout(self.config.request_timeout());
        CacheManager::new(Arc::new(store), Arc::new(fetcher))
    }
}

//! Background event dispatcher.
//!
//! Events arrive over an mpsc channel and each one runs on its own task, so
//! a failing or panicking handler never stops the dispatcher.

use std::sync::Arc;

use rgpl_sync::Drain;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::events::{
    completion_scope, EventOutcome, EventTicket, WaitUntil, WorkerEvent, SYNC_PENDING_TAG,
};
use crate::lifecycle::CacheManager;

const EVENT_QUEUE_DEPTH: usize = 64;

struct Envelope {
    event: WorkerEvent,
    reply: oneshot::Sender<EventOutcome>,
    token: WaitUntil,
}

pub struct BackgroundWorker {
    cache: Arc<CacheManager>,
    drain: Arc<dyn Drain>,
    rx: mpsc::Receiver<Envelope>,
}

/// Sends events to a running [`BackgroundWorker`].
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
}

impl BackgroundWorker {
    pub fn new(cache: Arc<CacheManager>, drain: Arc<dyn Drain>) -> (Self, WorkerHandle) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        (BackgroundWorker { cache, drain, rx }, WorkerHandle { tx })
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Dispatch events until every handle is dropped, then wait for the
    /// events still in flight.
    pub async fn run(mut self) {
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                envelope = self.rx.recv() => {
                    let Some(envelope) = envelope else { break };
                    let cache = Arc::clone(&self.cache);
                    let drain = Arc::clone(&self.drain);
                    in_flight.spawn(async move {
                        let Envelope { event, reply, token } = envelope;
                        let name = event.name();
                        debug!(event = name, "event received");
                        let outcome = handle_event(&cache, drain, event, token).await;
                        debug!(event = name, "event handled");
                        let _ = reply.send(outcome);
                    });
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join(joined);
                }
            }
        }
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        info!("background worker stopped");
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "event handler panicked");
    }
}

async fn handle_event(
    cache: &CacheManager,
    drain: Arc<dyn Drain>,
    event: WorkerEvent,
    token: WaitUntil,
) -> EventOutcome {
    match event {
        WorkerEvent::Install(manifest) => match cache.install(&manifest).await {
            Ok(report) => {
                cache.skip_waiting().await;
                EventOutcome::Installed(report)
            }
            Err(e) => {
                error!(version = %manifest.version, error = %e, "install failed");
                EventOutcome::Failed(e.to_string())
            }
        },
        WorkerEvent::Activate => match cache.activate().await {
            Ok(report) => EventOutcome::Activated(report),
            Err(e) => {
                error!(error = %e, "activation failed");
                EventOutcome::Failed(e.to_string())
            }
        },
        WorkerEvent::Fetch { path } => EventOutcome::Fetch(cache.handle_fetch(&path)),
        WorkerEvent::Sync { tag } if tag == SYNC_PENDING_TAG => {
            // The drain holds the event open until it settles.
            let hold = token.clone();
            let task = tokio::spawn(async move {
                let _hold = hold;
                drain.drain().await
            });
            match task.await {
                Ok(outcome) => {
                    if let Some(e) = outcome.error() {
                        warn!(error = %e, "background drain finished with an error");
                    }
                    EventOutcome::Drained(outcome)
                }
                Err(e) => {
                    error!(error = %e, "background drain task failed");
                    EventOutcome::Failed(e.to_string())
                }
            }
        }
        WorkerEvent::Sync { tag } => {
            debug!(tag = %tag, "ignoring unknown sync tag");
            EventOutcome::Ignored { tag }
        }
    }
}

impl WorkerHandle {
    /// Queue an event. Fails only when the worker has stopped.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventTicket, WorkerError> {
        let (reply, outcome) = oneshot::channel();
        let (token, settled) = completion_scope();
        self.tx
            .send(Envelope {
                event,
                reply,
                token,
            })
            .await
            .map_err(|_| WorkerError::Stopped)?;
        Ok(EventTicket { outcome, settled })
    }

    /// Raise the reconnect signal.
    pub async fn sync_pending(&self) -> Result<EventTicket, WorkerError> {
        self.dispatch(WorkerEvent::sync_pending()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{AssetFetcher, CachedResponse, FetchError};
    use crate::lifecycle::FetchDisposition;
    use crate::manifest::AssetManifest;
    use crate::snapshot::MemorySnapshotStore;
    use async_trait::async_trait;
    use rgpl_sync::{DrainOutcome, DrainReport};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct EchoFetcher;

    #[async_trait]
    impl AssetFetcher for EchoFetcher {
        async fn fetch(&self, path: &str) -> Result<CachedResponse, FetchError> {
            Ok(CachedResponse {
                path: path.to_string(),
                status: 200,
                content_type: None,
                body: path.as_bytes().to_vec(),
            })
        }
    }

    /// Drain that takes a while and counts its runs.
    #[derive(Default)]
    struct SlowDrain {
        runs: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl Drain for SlowDrain {
        async fn drain(&self) -> DrainOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            DrainOutcome::Completed(DrainReport::default())
        }
    }

    fn worker(drain: Arc<SlowDrain>) -> (BackgroundWorker, WorkerHandle) {
        let cache = CacheManager::new(Arc::new(MemorySnapshotStore::new()), Arc::new(EchoFetcher));
        BackgroundWorker::new(Arc::new(cache), drain)
    }

    #[tokio::test]
    async fn sync_pending_drains_and_holds_event_open() {
        let drain = Arc::new(SlowDrain::default());
        let (worker, handle) = worker(drain.clone());
        let running = tokio::spawn(worker.run());

        let outcome = handle.sync_pending().await.unwrap().wait().await;
        assert_eq!(outcome, EventOutcome::Drained(DrainOutcome::Completed(Default::default())));
        assert_eq!(drain.finished.load(Ordering::SeqCst), 1);

        drop(handle);
        running.await.unwrap();
    }

    #[tokio::test]
    async fn unknown_sync_tag_is_ignored() {
        let drain = Arc::new(SlowDrain::default());
        let (worker, handle) = worker(drain.clone());
        tokio::spawn(worker.run());

        let outcome = handle
            .dispatch(WorkerEvent::Sync {
                tag: "other".to_string(),
            })
            .await
            .unwrap()
            .wait()
            .await;
        assert_eq!(
            outcome,
            EventOutcome::Ignored {
                tag: "other".to_string()
            }
        );
        assert_eq!(drain.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn install_then_activate_through_events() {
        let (worker, handle) = worker(Arc::new(SlowDrain::default()));
        let cache = Arc::clone(worker.cache());
        tokio::spawn(worker.run());

        let manifest = AssetManifest::new("v1", ["/", "/login"]);
        let installed = handle
            .dispatch(WorkerEvent::Install(manifest))
            .await
            .unwrap()
            .wait()
            .await;
        assert!(matches!(installed, EventOutcome::Installed(ref r) if r.cached.len() == 2));

        let activated = handle.dispatch(WorkerEvent::Activate).await.unwrap().wait().await;
        assert!(matches!(activated, EventOutcome::Activated(_)));
        assert_eq!(cache.state().await, crate::lifecycle::CacheState::Active("v1".into()));

        let fetched = handle
            .dispatch(WorkerEvent::Fetch {
                path: "/".to_string(),
            })
            .await
            .unwrap()
            .wait()
            .await;
        assert_eq!(fetched, EventOutcome::Fetch(FetchDisposition::Network));
    }

    #[tokio::test]
    async fn failed_event_does_not_stop_dispatcher() {
        let drain = Arc::new(SlowDrain::default());
        let (worker, handle) = worker(drain.clone());
        tokio::spawn(worker.run());

        let failed = handle.dispatch(WorkerEvent::Activate).await.unwrap().wait().await;
        assert!(matches!(failed, EventOutcome::Failed(_)));

        let outcome = handle.sync_pending().await.unwrap().wait().await;
        assert!(matches!(outcome, EventOutcome::Drained(_)));
    }

    #[tokio::test]
    async fn concurrent_events_each_settle() {
        let drain = Arc::new(SlowDrain::default());
        let (worker, handle) = worker(drain.clone());
        tokio::spawn(worker.run());

        let first = handle.sync_pending().await.unwrap();
        let second = handle.sync_pending().await.unwrap();
        let (a, b) = tokio::join!(first.wait(), second.wait());
        assert!(matches!(a, EventOutcome::Drained(_)));
        assert!(matches!(b, EventOutcome::Drained(_)));
        assert_eq!(drain.finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dispatch_after_stop_fails() {
        let (worker, handle) = worker(Arc::new(SlowDrain::default()));
        drop(worker);
        assert!(matches!(
            handle.sync_pending().await,
            Err(WorkerError::Stopped)
        ));
    }
}

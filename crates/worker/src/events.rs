//! Named background events and their completion tracking.

use rgpl_sync::DrainOutcome;
use tokio::sync::{mpsc, oneshot};

use crate::lifecycle::{ActivationReport, FetchDisposition, InstallReport};
use crate::manifest::AssetManifest;

/// Tag of the reconnect signal that drains the offline queue.
pub const SYNC_PENDING_TAG: &str = "sync-pending";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Install(AssetManifest),
    Activate,
    Fetch { path: String },
    Sync { tag: String },
}

impl WorkerEvent {
    pub fn sync_pending() -> Self {
        WorkerEvent::Sync {
            tag: SYNC_PENDING_TAG.to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Install(_) => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch { .. } => "fetch",
            WorkerEvent::Sync { .. } => "sync",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivationReport),
    Fetch(FetchDisposition),
    Drained(DrainOutcome),
    /// A sync event with a tag nobody handles.
    Ignored { tag: String },
    Failed(String),
}

/// Keeps an event open. The event settles once every clone is dropped.
#[derive(Debug, Clone)]
pub struct WaitUntil {
    _hold: mpsc::Sender<()>,
}

/// Resolves when every [`WaitUntil`] of one event has been released.
#[derive(Debug)]
pub struct Settled {
    rx: mpsc::Receiver<()>,
}

impl Settled {
    pub async fn wait(mut self) {
        // Nothing is ever sent: recv returns None once all senders are gone.
        let _ = self.rx.recv().await;
    }
}

/// A fresh completion scope for one event.
pub fn completion_scope() -> (WaitUntil, Settled) {
    let (tx, rx) = mpsc::channel(1);
    (WaitUntil { _hold: tx }, Settled { rx })
}

/// Handed back by the dispatcher for every accepted event.
#[derive(Debug)]
pub struct EventTicket {
    pub(crate) outcome: oneshot::Receiver<EventOutcome>,
    pub(crate) settled: Settled,
}

impl EventTicket {
    /// Wait until the event settles and return its outcome.
    pub async fn wait(self) -> EventOutcome {
        self.settled.wait().await;
        self.outcome
            .await
            .unwrap_or_else(|_| EventOutcome::Failed("event handler did not complete".to_string()))
    }
}

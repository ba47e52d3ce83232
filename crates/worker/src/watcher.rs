use std::sync::Arc;
use std::time::Duration;

use rgpl_sync::{ConnectionMonitor, ConnectionState, SyncApi, Transition};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::WorkerError;
use crate::events::EventTicket;
use crate::worker::WorkerHandle;

/// Probes the server and raises `sync-pending` whenever it comes back.
pub struct ConnectivityWatcher {
    api: Arc<dyn SyncApi>,
    monitor: ConnectionMonitor,
    worker: WorkerHandle,
    interval: Duration,
}

impl ConnectivityWatcher {
    pub fn new(
        api: Arc<dyn SyncApi>,
        monitor: ConnectionMonitor,
        worker: WorkerHandle,
        interval: Duration,
    ) -> Self {
        ConnectivityWatcher {
            api,
            monitor,
            worker,
            interval,
        }
    }

    /// Probe once. Returns the ticket of the raised event on reconnect.
    pub async fn check(&self) -> Result<Option<EventTicket>, WorkerError> {
        let state = if self.api.probe().await {
            ConnectionState::Online
        } else {
            ConnectionState::Offline
        };
        match self.monitor.set(state) {
            Transition::Reconnected => {
                info!("server reachable again, raising sync-pending");
                Ok(Some(self.worker.sync_pending().await?))
            }
            Transition::Disconnected | Transition::Unchanged => Ok(None),
        }
    }

    /// Probe on every tick until the worker stops.
    pub async fn run(self) -> Result<(), WorkerError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(ticket) = self.check().await? {
                tokio::spawn(async move {
                    let outcome = ticket.wait().await;
                    debug!(?outcome, "reconnect sync settled");
                });
            }
        }
    }
}

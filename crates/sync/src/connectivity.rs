use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Whether the client believes it can reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Online,
    Offline,
}

impl ConnectionState {
    /// Label shown in the status view before the server reports its own.
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Online => "🟢 En ligne",
            ConnectionState::Offline => "🔴 Hors ligne",
        }
    }

    pub fn is_online(self) -> bool {
        self == ConnectionState::Online
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of recording a new observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Reconnected,
    Disconnected,
}

/// Shared, observable connection state.
///
/// Cloning gives another handle on the same state. Subscribers are woken on
/// every change.
#[derive(Clone)]
pub struct ConnectionMonitor {
    tx: Arc<watch::Sender<ConnectionState>>,
}

impl ConnectionMonitor {
    pub fn new(initial: ConnectionState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        ConnectionMonitor { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Record an observation and report whether it changed the state.
    pub fn set(&self, state: ConnectionState) -> Transition {
        let mut previous = state;
        let changed = self.tx.send_if_modified(|current| {
            previous = *current;
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if !changed {
            return Transition::Unchanged;
        }
        info!(from = %previous, to = %state, "connection state changed");
        match state {
            ConnectionState::Online => Transition::Reconnected,
            ConnectionState::Offline => Transition::Disconnected,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new(ConnectionState::Online)
    }
}

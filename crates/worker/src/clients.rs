//! Open page sessions and which cache version controls them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

#[derive(Default)]
struct Registry {
    next: u64,
    /// Client id to controlling version; `None` means uncontrolled.
    clients: BTreeMap<ClientId, Option<String>>,
}

/// Shared registry of open clients. Cloning gives another handle on it.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened client, controlled by `controller` if any.
    pub async fn open(&self, controller: Option<&str>) -> ClientId {
        let mut registry = self.inner.lock().await;
        registry.next += 1;
        let id = ClientId(registry.next);
        registry
            .clients
            .insert(id, controller.map(|c| c.to_string()));
        id
    }

    pub async fn close(&self, id: ClientId) -> bool {
        self.inner.lock().await.clients.remove(&id).is_some()
    }

    pub async fn controller(&self, id: ClientId) -> Option<String> {
        self.inner.lock().await.clients.get(&id).cloned().flatten()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of clients controlled by something other than `version`.
    pub async fn controlled_elsewhere(&self, version: &str) -> usize {
        self.inner
            .lock()
            .await
            .clients
            .values()
            .filter(|c| c.as_deref().is_some_and(|c| c != version))
            .count()
    }

    /// Take control of every open client. Returns how many changed controller.
    pub async fn claim(&self, version: &str) -> usize {
        let mut registry = self.inner.lock().await;
        let mut claimed = 0;
        for controller in registry.clients.values_mut() {
            if controller.as_deref() != Some(version) {
                *controller = Some(version.to_string());
                claimed += 1;
            }
        }
        info!(version, claimed, "clients claimed");
        claimed
    }
}

//! User-facing alerts raised by sync operations.

use tracing::info;

pub const FORCE_SYNC_FAILED_ALERT: &str = "Échec de la synchronisation ❌";
pub const ZONES_IMPORTED_ALERT: &str = "Zones importées avec succès ✅";
pub const ZONES_IMPORT_FAILED_ALERT: &str = "Échec de l'import des zones ❌";
pub const NO_ZONE_FILE_ALERT: &str = "Veuillez sélectionner un fichier CSV ou Excel.";

/// Sink for messages the user must see.
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Notifier that only logs. Used when no terminal is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn alert(&self, message: &str) {
        info!(alert = message, "user alert");
    }
}

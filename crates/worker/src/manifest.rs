//! The fixed list of routes and assets pre-cached for offline use.

use serde::{Deserialize, Serialize};

use crate::error::WorkerError;

/// Current deploy-time cache version. Bump on every deploy that changes assets.
pub const CACHE_NAME: &str = "rgpl-cache-v2";

/// Pages, static assets, and templates available offline.
pub const DEFAULT_OFFLINE_PATHS: &[&str] = &[
    "/",
    "/home",
    "/login",
    "/page-famille-edit",
    "/page-familles",
    "/page-utilisateurs",
    "/page-stats",
    "/doublons",
    "/synchronisation",
    "/zone-travail",
    "/zones-attribuees",
    "/unauthorized",
    "/offline.html",
    "/static/style.css",
    "/static/js/db.js",
    "/static/js/main.js",
    "/static/icons/icons.svg",
    "/static/images/rgpl.png",
    "/add_membre.html",
    "/admin_dashboard.html",
    "/base.html",
    "/doublons.html",
    "/edit_famille.html",
    "/familles.html",
    "/famille_detail.html",
    "/famille_edit.html",
    "/index.html",
    "/login.html",
    "/stats.html",
    "/synchronisation.html",
    "/unauthorized.html",
    "/utilisateurs.html",
    "/zones_attribuees.html",
    "/zone_travail.html",
];

/// A cache version and the paths it must hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub version: String,
    pub paths: Vec<String>,
}

impl AssetManifest {
    pub fn new(version: &str, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        AssetManifest {
            version: version.to_string(),
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// The shipped manifest at the current [`CACHE_NAME`].
    pub fn default_offline() -> Self {
        Self::new(CACHE_NAME, DEFAULT_OFFLINE_PATHS.iter().copied())
    }

    pub fn validate(&self) -> Result<(), WorkerError> {
        validate_version(&self.version)
    }
}

/// Version names are used as directory names under the cache root.
pub fn validate_version(version: &str) -> Result<(), WorkerError> {
    let plain = !version.is_empty()
        && !version.starts_with('.')
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if plain {
        Ok(())
    } else {
        Err(WorkerError::InvalidVersion(version.to_string()))
    }
}

//! Core domain types shared across Ecom OS crates

use serde::{Deserialize, Serialize};

/// An authenticated identity as rendered by the UI surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    /// Rendered verbatim in the selector greeting and the sub-app shell header.
    pub display_name: String,
    pub created_at: i64,
}

/// A launchable sub-application presented on the app selector.
#[derive(Debug, Clone, Serialize)]
pub struct AppCard {
    /// Stable key, also used as the `data-testid="app-card-{key}"` suffix.
    pub key: &'static str,
    /// Human-readable label shown on the launch control.
    pub label: &'static str,
    /// Root path of the sub-application shell.
    pub path: &'static str,
}

/// Static catalog of sub-applications available post-login.
pub const APP_CATALOG: &[AppCard] = &[AppCard {
    key: "wms",
    label: "Warehouse Management",
    path: "/wms",
}];

/// Look up a catalog entry by key.
pub fn app_by_key(key: &str) -> Option<&'static AppCard> {
    APP_CATALOG.iter().find(|a| a.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_wms() {
        let wms = app_by_key("wms").unwrap();
        assert_eq!(wms.label, "Warehouse Management");
        assert_eq!(wms.path, "/wms");
    }

    #[test]
    fn test_unknown_app() {
        assert!(app_by_key("crm").is_none());
    }
}

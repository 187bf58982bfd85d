//! SettingsStore - externally persisted configuration view
//!
//! ## Responsibilities
//!
//! - String-keyed settings cache (the host platform persists it externally)
//! - Overlay resolution from `overlay:<id>:{type,device,prefix,text}` keys
//! - Service-level settings (update interval)
//!
//! Reads are synchronous so event callbacks can resolve the current overlay
//! configuration without suspending.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use regex::Regex;

use crate::models::{Overlay, OverlayType};

/// Manual "force refresh now" button, service level
pub const GET_OVERLAY_CONFIGURATIONS_KEY: &str = "getCurrentOverlayConfigurations";
/// Copies overlay configuration from another camera registered on the bridge
pub const DUPLICATE_FROM_DEVICE_KEY: &str = "duplicateFromDevice";
/// Periodic resync interval in seconds
pub const UPDATE_INTERVAL_KEY: &str = "updateInterval";

const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 10;

/// Settings keys for one overlay id
#[derive(Debug, Clone)]
pub struct OverlayKeys {
    pub type_key: String,
    pub device_key: String,
    pub prefix_key: String,
    pub text_key: String,
    pub update_key: String,
}

/// Build the settings keys for an overlay id
pub fn overlay_keys(overlay_id: &str) -> OverlayKeys {
    OverlayKeys {
        type_key: format!("overlay:{overlay_id}:type"),
        device_key: format!("overlay:{overlay_id}:device"),
        prefix_key: format!("overlay:{overlay_id}:prefix"),
        text_key: format!("overlay:{overlay_id}:text"),
        update_key: format!("overlay:{overlay_id}:update"),
    }
}

/// Extract the overlay id from an `overlay:<id>:update` key
pub fn overlay_update_key_id(key: &str) -> Option<String> {
    let re = Regex::new(r"^overlay:(.+):update$").unwrap();
    re.captures(key).map(|c| c[1].to_string())
}

/// Extract the overlay id from any `overlay:<id>:*` key
pub fn overlay_key_id(key: &str) -> Option<String> {
    let re = Regex::new(r"^overlay:([^:]+):").unwrap();
    re.captures(key).map(|c| c[1].to_string())
}

/// In-memory settings view
pub struct SettingsStore {
    entries: RwLock<HashMap<String, String>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    /// Resolve one overlay's configuration. Never fails: unset fields default
    /// to empty strings and an unset type resolves to `OverlayType::None`.
    pub fn overlay(&self, overlay_id: &str) -> Overlay {
        let keys = overlay_keys(overlay_id);
        Overlay {
            id: overlay_id.to_string(),
            overlay_type: OverlayType::parse(&self.get(&keys.type_key).unwrap_or_default()),
            device_id: self.get(&keys.device_key).unwrap_or_default(),
            prefix: self.get(&keys.prefix_key).unwrap_or_default(),
            text: self.get(&keys.text_key).unwrap_or_default(),
        }
    }

    /// Periodic resync interval, floored at one second
    pub fn update_interval_secs(&self) -> u64 {
        self.get(UPDATE_INTERVAL_KEY)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_UPDATE_INTERVAL_SECS)
            .max(1)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

//! Process-wide registry of attached overlay services
//!
//! Replaces the ambient "global mixins map" pattern: services are registered
//! with an explicit lifecycle - attached when a camera comes under management,
//! detached on release - and reachable only through lookup.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::service::OverlayService;

pub struct OverlayRegistry {
    services: RwLock<HashMap<String, Arc<OverlayService>>>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Register a service under its camera device id
    pub fn attach(&self, service: Arc<OverlayService>) {
        let camera_id = service.camera_device_id().to_string();
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(camera_id.clone(), service);
        tracing::debug!(camera_id = %camera_id, "Overlay service attached");
    }

    pub fn detach(&self, camera_device_id: &str) -> Option<Arc<OverlayService>> {
        let removed = self
            .services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(camera_device_id);
        if removed.is_some() {
            tracing::debug!(camera_id = %camera_device_id, "Overlay service detached");
        }
        removed
    }

    pub fn get(&self, camera_device_id: &str) -> Option<Arc<OverlayService>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(camera_device_id)
            .cloned()
    }

    pub fn camera_ids(&self) -> Vec<String> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl Default for OverlayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

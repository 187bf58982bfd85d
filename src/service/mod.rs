//! OverlayService - per-camera overlay orchestration
//!
//! ## Responsibilities
//!
//! - Periodic full resync pass (catches drift and out-of-band config writes)
//! - Immediate reconcile/update after any configuration write
//! - Seeding overlay ids and current titles from the camera
//! - Duplicating overlay configuration from another managed camera
//! - Teardown on release
//!
//! The periodic pass and event-driven updates both funnel through the same
//! update queue, so they cannot race each other on the camera.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::camera_client::CameraClient;
use crate::device_bus::DeviceBus;
use crate::face_tracker::FaceTracker;
use crate::reconciler::ListenerReconciler;
use crate::registry::OverlayRegistry;
use crate::settings_store::{
    overlay_key_id, overlay_keys, overlay_update_key_id, SettingsStore,
    DUPLICATE_FROM_DEVICE_KEY, GET_OVERLAY_CONFIGURATIONS_KEY,
};
use crate::update_queue::{UpdateQueue, DEFAULT_MIN_SPACING};
use crate::{Error, Result};

/// What a manual "update now" trigger does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// Push the overlay's current text only
    #[default]
    RefreshOnly,
    /// Re-run reconciliation for the overlay first, potentially changing
    /// its subscription, then push
    FullResync,
}

/// Service construction parameters
#[derive(Debug, Clone)]
pub struct OverlayServiceConfig {
    pub camera_device_id: String,
    /// Minimum spacing between consecutive camera writes
    pub min_write_spacing: Duration,
    pub force_update_policy: UpdatePolicy,
}

impl OverlayServiceConfig {
    pub fn new(camera_device_id: impl Into<String>) -> Self {
        Self {
            camera_device_id: camera_device_id.into(),
            min_write_spacing: DEFAULT_MIN_SPACING,
            force_update_policy: UpdatePolicy::default(),
        }
    }
}

pub struct OverlayService {
    camera_device_id: String,
    store: Arc<SettingsStore>,
    client: Arc<dyn CameraClient>,
    registry: Arc<OverlayRegistry>,
    reconciler: Arc<ListenerReconciler>,
    policy: UpdatePolicy,
    overlay_ids: RwLock<Vec<String>>,
    running: RwLock<bool>,
    tick: Mutex<Option<JoinHandle<()>>>,
}

impl OverlayService {
    pub fn new(
        config: OverlayServiceConfig,
        store: Arc<SettingsStore>,
        bus: Arc<dyn DeviceBus>,
        client: Arc<dyn CameraClient>,
        registry: Arc<OverlayRegistry>,
    ) -> Arc<Self> {
        let queue = UpdateQueue::start(client.clone(), config.min_write_spacing);
        let face_tracker = Arc::new(FaceTracker::new());
        let reconciler = Arc::new(ListenerReconciler::new(
            config.camera_device_id.clone(),
            store.clone(),
            bus,
            queue,
            face_tracker,
        ));

        Arc::new(Self {
            camera_device_id: config.camera_device_id,
            store,
            client,
            registry,
            reconciler,
            policy: config.force_update_policy,
            overlay_ids: RwLock::new(Vec::new()),
            running: RwLock::new(false),
            tick: Mutex::new(None),
        })
    }

    pub fn camera_device_id(&self) -> &str {
        &self.camera_device_id
    }

    pub fn store(&self) -> Arc<SettingsStore> {
        self.store.clone()
    }

    pub fn reconciler(&self) -> Arc<ListenerReconciler> {
        self.reconciler.clone()
    }

    pub async fn overlay_ids(&self) -> Vec<String> {
        self.overlay_ids.read().await.clone()
    }

    /// Seed state from the camera, run an immediate reconciliation pass, and
    /// start the periodic resync loop.
    pub async fn start(self: &Arc<Self>) {
        {
            let mut running = self.running.write().await;
            if *running {
                tracing::warn!(camera_id = %self.camera_device_id, "Overlay service already started");
                return;
            }
            *running = true;
        }

        if let Err(e) = self.refresh_from_camera().await {
            tracing::error!(
                camera_id = %self.camera_device_id,
                error = %e,
                "Initial overlay fetch failed, continuing with empty overlay set"
            );
        }
        self.resync_now().await;

        let service = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                // Interval re-read each lap so setting changes apply without restart
                let secs = service.store.update_interval_secs();
                tokio::time::sleep(Duration::from_secs(secs)).await;
                if !*service.running.read().await {
                    break;
                }
                service.resync_now().await;
            }
            tracing::debug!(camera_id = %service.camera_device_id, "Overlay tick loop stopped");
        });
        *self.tick.lock().await = Some(handle);

        tracing::info!(camera_id = %self.camera_device_id, "Overlay service started");
    }

    /// One full reconciliation pass with value refresh
    pub async fn resync_now(&self) {
        let ids = self.overlay_ids.read().await.clone();
        self.reconciler.resync(&ids, true).await;
    }

    /// Read the camera's current overlay configuration: replaces the known
    /// overlay id set and seeds each overlay's text setting. On failure the
    /// previous id set is kept untouched.
    pub async fn refresh_from_camera(&self) -> Result<()> {
        let config = self.client.fetch_overlay_config().await?;

        let mut ids: Vec<String> = config.keys().cloned().collect();
        ids.sort_by_key(|id| (id.parse::<u64>().unwrap_or(u64::MAX), id.clone()));

        for (overlay_id, text) in &config {
            self.store.set(&overlay_keys(overlay_id).text_key, text);
        }
        *self.overlay_ids.write().await = ids;

        tracing::info!(
            camera_id = %self.camera_device_id,
            overlays = config.len(),
            "Overlay configuration refreshed from camera"
        );
        Ok(())
    }

    /// Route one settings write. Every `overlay:<id>:*` write triggers an
    /// immediate reconcile and push for that overlay.
    pub async fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        if key == GET_OVERLAY_CONFIGURATIONS_KEY {
            return self.refresh_from_camera().await;
        }
        if key == DUPLICATE_FROM_DEVICE_KEY {
            return self.duplicate_from(value).await;
        }
        if let Some(overlay_id) = overlay_update_key_id(key) {
            self.force_update(&overlay_id).await;
            return Ok(());
        }

        self.store.set(key, value);
        if let Some(overlay_id) = overlay_key_id(key) {
            self.reconciler.resync_overlay(&overlay_id).await;
            let ids = self.overlay_ids.read().await.clone();
            self.reconciler.update_detector(&ids).await;
        }
        Ok(())
    }

    /// Manual "update now" for one overlay, per the configured policy
    pub async fn force_update(&self, overlay_id: &str) {
        match self.policy {
            UpdatePolicy::RefreshOnly => {
                if let Err(e) = self.reconciler.refresh_overlay(overlay_id).await {
                    tracing::warn!(overlay_id = %overlay_id, error = %e, "Overlay refresh failed");
                }
            }
            UpdatePolicy::FullResync => {
                self.reconciler.resync_overlay(overlay_id).await;
                let ids = self.overlay_ids.read().await.clone();
                self.reconciler.update_detector(&ids).await;
            }
        }
    }

    /// Copy `{type, device, prefix}` for every overlay the source camera has
    /// configured. Literal text is device-specific and never copied.
    pub async fn duplicate_from(&self, source_camera_id: &str) -> Result<()> {
        let source = self.registry.get(source_camera_id).ok_or_else(|| {
            Error::NotFound(format!(
                "no overlay service attached for camera {source_camera_id}"
            ))
        })?;

        let source_store = source.store();
        let source_ids = source.overlay_ids().await;
        for overlay_id in &source_ids {
            let overlay = source_store.overlay(overlay_id);
            let keys = overlay_keys(overlay_id);
            self.store.set(&keys.type_key, overlay.overlay_type.as_str());
            self.store.set(&keys.device_key, &overlay.device_id);
            self.store.set(&keys.prefix_key, &overlay.prefix);
        }

        tracing::info!(
            camera_id = %self.camera_device_id,
            source = %source_camera_id,
            overlays = source_ids.len(),
            "Overlay configuration duplicated"
        );
        self.resync_now().await;
        Ok(())
    }

    /// Stop the periodic loop and tear down every subscription. No callback
    /// fires after this returns; pending queue entries still drain.
    pub async fn release(&self) {
        {
            let mut running = self.running.write().await;
            if !*running {
                return;
            }
            *running = false;
        }

        if let Some(handle) = self.tick.lock().await.take() {
            handle.abort();
        }
        self.reconciler.shutdown().await;
        self.registry.detach(&self.camera_device_id);

        tracing::info!(camera_id = %self.camera_device_id, "Overlay service released");
    }
}

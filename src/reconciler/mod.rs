//! ListenerReconciler - desired vs. actual subscription state
//!
//! ## Responsibilities
//!
//! - Compute the desired listener binding per overlay from its configuration
//! - Diff against the active subscriptions, tearing down and creating as needed
//! - Route live events through the translator into the update queue
//! - Manage the single face detection subscription feeding the FaceTracker
//!
//! Passes are diff-based and idempotent, so a re-entered resync converges
//! instead of racing. The binding map is only mutated under its write lock
//! and is owned exclusively by this component.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::device_bus::{
    Capability, DeviceBus, EventHandler, SensorDevice, SubscriptionHandle, CAPABILITY_PRIORITY,
};
use crate::face_tracker::FaceTracker;
use crate::models::{EventPayload, ListenerKind, ObjectsDetected, Overlay, OverlayType};
use crate::settings_store::SettingsStore;
use crate::translator::{translate, TranslateContext};
use crate::update_queue::UpdateQueue;
use crate::Result;

/// Live association between an overlay and a subscribed event stream
struct ListenerBinding {
    kind: ListenerKind,
    device_id: String,
    handle: SubscriptionHandle,
}

/// What an overlay's current configuration asks for
enum Desired {
    /// No subscription and no camera-side change (static text path)
    Unbound,
    /// No subscription; the overlay is force-disabled on the camera
    Disabled,
    /// A live subscription on `device_id` for `capability`
    Bound {
        kind: ListenerKind,
        capability: Capability,
        device_id: String,
        device: Option<Arc<dyn SensorDevice>>,
    },
}

pub struct ListenerReconciler {
    camera_device_id: String,
    store: Arc<SettingsStore>,
    bus: Arc<dyn DeviceBus>,
    queue: UpdateQueue,
    face_tracker: Arc<FaceTracker>,
    bindings: RwLock<HashMap<String, ListenerBinding>>,
    detector: RwLock<Option<SubscriptionHandle>>,
    /// Overlays currently force-disabled on the camera, so a transition into
    /// the disabled state issues exactly one disable call
    disabled: RwLock<HashSet<String>>,
}

impl ListenerReconciler {
    pub fn new(
        camera_device_id: String,
        store: Arc<SettingsStore>,
        bus: Arc<dyn DeviceBus>,
        queue: UpdateQueue,
        face_tracker: Arc<FaceTracker>,
    ) -> Self {
        Self {
            camera_device_id,
            store,
            bus,
            queue,
            face_tracker,
            bindings: RwLock::new(HashMap::new()),
            detector: RwLock::new(None),
            disabled: RwLock::new(HashSet::new()),
        }
    }

    /// One full reconciliation pass over all known overlays.
    ///
    /// With `push_values` set (the periodic pass), overlays bound to a device
    /// or to face detection also get an immediate text push from the current
    /// reading, catching drift between events. Static text overlays are only
    /// pushed on configuration changes.
    ///
    /// Per-overlay failures are logged and do not abort sibling overlays.
    pub async fn resync(&self, overlay_ids: &[String], push_values: bool) {
        for overlay_id in overlay_ids {
            if let Err(e) = self.resync_one(overlay_id, push_values).await {
                tracing::warn!(
                    overlay_id = %overlay_id,
                    error = %e,
                    "Overlay reconciliation failed"
                );
            }
        }
        self.update_detector(overlay_ids).await;
        self.prune_stale(overlay_ids).await;
    }

    /// Incremental pass for one overlay after a configuration write. Always
    /// pushes the overlay's current text, including static text.
    pub async fn resync_overlay(&self, overlay_id: &str) {
        if let Err(e) = self.resync_one(overlay_id, false).await {
            tracing::warn!(overlay_id = %overlay_id, error = %e, "Overlay reconciliation failed");
        }
        if let Err(e) = self.refresh_overlay(overlay_id).await {
            tracing::warn!(overlay_id = %overlay_id, error = %e, "Overlay refresh failed");
        }
    }

    async fn resync_one(&self, overlay_id: &str, push_values: bool) -> Result<()> {
        let overlay = self.store.overlay(overlay_id);
        match self.desired_for(&overlay) {
            Desired::Unbound => {
                self.remove_binding(overlay_id).await;
                self.mark_active(overlay_id).await;
            }
            Desired::Disabled => {
                self.remove_binding(overlay_id).await;
                self.force_disable_once(overlay_id).await;
            }
            Desired::Bound {
                kind,
                capability,
                device_id,
                device,
            } => {
                self.mark_active(overlay_id).await;
                self.ensure_binding(overlay_id, kind, capability, &device_id, device)
                    .await?;
                if push_values {
                    self.refresh_overlay(overlay_id).await?;
                }
            }
        }
        Ok(())
    }

    /// Direct text push for one overlay, bypassing live events: literal text,
    /// the bound device's current reading, or the cached face label.
    pub async fn refresh_overlay(&self, overlay_id: &str) -> Result<()> {
        let overlay = self.store.overlay(overlay_id);
        match overlay.overlay_type {
            OverlayType::None => {
                self.force_disable_once(overlay_id).await;
            }
            OverlayType::Text => {
                self.push(overlay_id, &overlay.text).await;
            }
            OverlayType::Device => match self.desired_for(&overlay) {
                Desired::Bound { kind, device, .. } => {
                    let Some(device) = device else {
                        return Ok(());
                    };
                    let payload = match kind {
                        ListenerKind::Temperature => {
                            device.temperature().map(EventPayload::Temperature)
                        }
                        ListenerKind::Humidity => device.humidity().map(EventPayload::Humidity),
                        ListenerKind::Lock => device.lock_state().map(EventPayload::Lock),
                        ListenerKind::Face => None,
                    };
                    let Some(payload) = payload else {
                        tracing::debug!(
                            overlay_id = %overlay_id,
                            device_id = %overlay.device_id,
                            "Device has no current reading, keeping last overlay state"
                        );
                        return Ok(());
                    };
                    let ctx = TranslateContext {
                        temperature_unit: device.temperature_unit(),
                        last_face_label: None,
                    };
                    let text = translate(kind, &payload, &overlay, &ctx);
                    self.push(overlay_id, &text).await;
                }
                _ => {
                    self.force_disable_once(overlay_id).await;
                }
            },
            OverlayType::FaceDetection => {
                let ctx = TranslateContext {
                    temperature_unit: None,
                    last_face_label: self.face_tracker.last_label(),
                };
                let text = translate(
                    ListenerKind::Face,
                    &EventPayload::Detections(ObjectsDetected::default()),
                    &overlay,
                    &ctx,
                );
                self.push(overlay_id, &text).await;
            }
        }
        Ok(())
    }

    /// Ensure the face detection subscription exists iff at least one
    /// FaceDetection overlay is configured. The subscription is on the
    /// camera's own detector and feeds the FaceTracker only; it is not tied
    /// to any single overlay.
    pub async fn update_detector(&self, overlay_ids: &[String]) {
        let needed = overlay_ids
            .iter()
            .any(|id| self.store.overlay(id).overlay_type == OverlayType::FaceDetection);

        let mut detector = self.detector.write().await;
        if needed && detector.is_none() {
            tracing::info!(camera_id = %self.camera_device_id, "Starting face detection listener");
            let face_tracker = self.face_tracker.clone();
            let handler: EventHandler = Arc::new(move |payload| {
                if let EventPayload::Detections(detected) = payload {
                    face_tracker.observe(&detected);
                }
            });
            match self
                .bus
                .subscribe(&self.camera_device_id, Capability::ObjectDetector, handler)
            {
                Ok(handle) => *detector = Some(handle),
                Err(e) => {
                    tracing::warn!(
                        camera_id = %self.camera_device_id,
                        error = %e,
                        "Face detection listener not created"
                    );
                }
            }
        } else if !needed {
            if let Some(handle) = detector.take() {
                tracing::info!(camera_id = %self.camera_device_id, "Stopping face detection listener");
                self.bus.unsubscribe(handle);
            }
        }
    }

    /// Tear down every subscription, including the detector. No callback
    /// fires after this returns.
    pub async fn shutdown(&self) {
        let mut bindings = self.bindings.write().await;
        for (overlay_id, binding) in bindings.drain() {
            tracing::debug!(
                overlay_id = %overlay_id,
                kind = ?binding.kind,
                "Removing listener on shutdown"
            );
            self.bus.unsubscribe(binding.handle);
        }
        drop(bindings);

        if let Some(handle) = self.detector.write().await.take() {
            self.bus.unsubscribe(handle);
        }
        tracing::info!(camera_id = %self.camera_device_id, "Reconciler shut down");
    }

    /// Snapshot of active bindings: (overlay id, kind, device id)
    pub async fn binding_info(&self) -> Vec<(String, ListenerKind, String)> {
        self.bindings
            .read()
            .await
            .iter()
            .map(|(id, b)| (id.clone(), b.kind, b.device_id.clone()))
            .collect()
    }

    pub async fn has_detector(&self) -> bool {
        self.detector.read().await.is_some()
    }

    fn desired_for(&self, overlay: &Overlay) -> Desired {
        match overlay.overlay_type {
            OverlayType::None => Desired::Disabled,
            OverlayType::Text => Desired::Unbound,
            OverlayType::Device => {
                if overlay.device_id.trim().is_empty() {
                    return Desired::Disabled;
                }
                let Some(device) = self.bus.device(&overlay.device_id) else {
                    tracing::warn!(
                        overlay_id = %overlay.id,
                        device_id = %overlay.device_id,
                        "Bound device not found, overlay treated as disabled"
                    );
                    return Desired::Disabled;
                };
                let capabilities = device.capabilities();
                let Some(capability) = CAPABILITY_PRIORITY
                    .into_iter()
                    .find(|c| capabilities.contains(c))
                else {
                    tracing::warn!(
                        overlay_id = %overlay.id,
                        device_id = %overlay.device_id,
                        "Device exposes no supported capability, overlay treated as disabled"
                    );
                    return Desired::Disabled;
                };
                Desired::Bound {
                    kind: capability.listener_kind(),
                    capability,
                    device_id: overlay.device_id.clone(),
                    device: Some(device),
                }
            }
            OverlayType::FaceDetection => Desired::Bound {
                kind: ListenerKind::Face,
                capability: Capability::ObjectDetector,
                device_id: self.camera_device_id.clone(),
                device: self.bus.device(&self.camera_device_id),
            },
        }
    }

    /// Create or replace the binding for one overlay. The whole diff and
    /// mutation happens under the write lock, so two interleaved passes can
    /// never leave two handles for the same overlay: the stale handle is
    /// always released before its replacement is created.
    async fn ensure_binding(
        &self,
        overlay_id: &str,
        kind: ListenerKind,
        capability: Capability,
        device_id: &str,
        device: Option<Arc<dyn SensorDevice>>,
    ) -> Result<()> {
        let mut bindings = self.bindings.write().await;

        if let Some(existing) = bindings.get(overlay_id) {
            if existing.kind == kind && existing.device_id == device_id {
                return Ok(());
            }
        }

        if let Some(stale) = bindings.remove(overlay_id) {
            tracing::info!(
                overlay_id = %overlay_id,
                old_kind = ?stale.kind,
                old_device = %stale.device_id,
                "Removing stale listener before rebinding"
            );
            self.bus.unsubscribe(stale.handle);
        }

        let handler = self.event_handler(overlay_id, kind, device);
        let handle = self.bus.subscribe(device_id, capability, handler)?;

        tracing::info!(
            overlay_id = %overlay_id,
            kind = ?kind,
            device_id = %device_id,
            "Listener created"
        );
        bindings.insert(
            overlay_id.to_string(),
            ListenerBinding {
                kind,
                device_id: device_id.to_string(),
                handle,
            },
        );
        Ok(())
    }

    /// Handler for one overlay's live events: resolve the overlay fresh from
    /// the store (prefix edits apply without rebinding), translate, enqueue.
    fn event_handler(
        &self,
        overlay_id: &str,
        kind: ListenerKind,
        device: Option<Arc<dyn SensorDevice>>,
    ) -> EventHandler {
        let store = self.store.clone();
        let queue = self.queue.clone();
        let face_tracker = self.face_tracker.clone();
        let overlay_id = overlay_id.to_string();

        Arc::new(move |payload| {
            let overlay = store.overlay(&overlay_id);
            let ctx = TranslateContext {
                temperature_unit: device.as_ref().and_then(|d| d.temperature_unit()),
                last_face_label: face_tracker.last_label(),
            };
            let text = translate(kind, &payload, &overlay, &ctx);
            queue.enqueue_update(&overlay_id, &text);
        })
    }

    async fn remove_binding(&self, overlay_id: &str) {
        let mut bindings = self.bindings.write().await;
        if let Some(binding) = bindings.remove(overlay_id) {
            tracing::info!(
                overlay_id = %overlay_id,
                kind = ?binding.kind,
                "Removing listener, overlay no longer event-driven"
            );
            self.bus.unsubscribe(binding.handle);
        }
    }

    /// Drop bindings for overlay ids the camera no longer reports
    async fn prune_stale(&self, overlay_ids: &[String]) {
        let stale: Vec<String> = {
            let bindings = self.bindings.read().await;
            bindings
                .keys()
                .filter(|id| !overlay_ids.contains(id))
                .cloned()
                .collect()
        };
        for overlay_id in stale {
            self.remove_binding(&overlay_id).await;
        }
    }

    async fn push(&self, overlay_id: &str, text: &str) {
        self.mark_active(overlay_id).await;
        self.queue.enqueue_update(overlay_id, text);
    }

    async fn force_disable_once(&self, overlay_id: &str) {
        if self.disabled.write().await.insert(overlay_id.to_string()) {
            tracing::info!(overlay_id = %overlay_id, "Disabling overlay on camera");
            self.queue.enqueue_disable(overlay_id);
        }
    }

    async fn mark_active(&self, overlay_id: &str) {
        self.disabled.write().await.remove(overlay_id);
    }
}

//! osd-bridge
//!
//! Maps live smart-home sensor state (temperature, humidity, lock state,
//! face detection) onto the on-screen text overlays of an IP camera.
//!
//! ## Architecture
//!
//! 1. SettingsStore - externally persisted configuration view, overlay resolution
//! 2. DeviceBus - host device/event subscription capability (trait)
//! 3. EventTranslator - payload to overlay text, per listener kind
//! 4. UpdateQueue - serialized camera writes (FIFO + minimum spacing)
//! 5. ListenerReconciler - desired vs. actual subscription state
//! 6. FaceTracker - cached label from the face detection stream
//! 7. CameraClient - camera overlay API (Amcrest/Dahua implementation)
//! 8. OverlayService - per-camera orchestration (tick loop, setting routing)
//! 9. OverlayRegistry - process-wide attach/detach lifecycle
//!
//! ## Design Principles
//!
//! - All camera-affecting writes funnel through the UpdateQueue
//! - Reconciliation passes are diff-based and idempotent
//! - Per-overlay failures never abort sibling overlays

pub mod camera_client;
pub mod device_bus;
pub mod error;
pub mod face_tracker;
pub mod models;
pub mod reconciler;
pub mod registry;
pub mod service;
pub mod settings_store;
pub mod translator;
pub mod update_queue;

pub use error::{Error, Result};

//! FaceTracker - cached label from the camera's face detection stream
//!
//! A single process-local cache fed by the detector subscription. Frames
//! without a labelled face leave the cache untouched, so the overlay keeps
//! showing the last recognized person between detections.

use std::sync::{PoisonError, RwLock};

use crate::models::ObjectsDetected;
use crate::translator::face_label;

pub struct FaceTracker {
    last_label: RwLock<Option<String>>,
}

impl FaceTracker {
    pub fn new() -> Self {
        Self {
            last_label: RwLock::new(None),
        }
    }

    /// Record the labelled face from a detection frame, if any
    pub fn observe(&self, detected: &ObjectsDetected) {
        if let Some(label) = face_label(detected) {
            tracing::debug!(label = %label, "Face detected");
            *self
                .last_label
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(label.to_string());
        }
    }

    pub fn last_label(&self) -> Option<String> {
        self.last_label
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        *self
            .last_label
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Default for FaceTracker {
    fn default() -> Self {
        Self::new()
    }
}

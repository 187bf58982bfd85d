//! Core data types shared across the overlay bridge

use serde::{Deserialize, Serialize};

/// How an overlay's text is sourced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayType {
    /// Overlay is unused and disabled on the camera
    None,
    /// Static literal text
    Text,
    /// Text driven by a bound sensor device
    Device,
    /// Text driven by the camera's own face detection stream
    FaceDetection,
}

impl Default for OverlayType {
    fn default() -> Self {
        Self::None
    }
}

impl OverlayType {
    /// Parse a stored settings value. Unknown or empty values fall back to `None`,
    /// so freshly discovered overlays stay disabled until configured.
    pub fn parse(value: &str) -> Self {
        match value {
            "Text" => Self::Text,
            "Device" => Self::Device,
            "FaceDetection" => Self::FaceDetection,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Text => "Text",
            Self::Device => "Device",
            Self::FaceDetection => "FaceDetection",
        }
    }
}

/// Kind of live event stream driving an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListenerKind {
    Temperature,
    Humidity,
    Lock,
    Face,
}

/// Lock device state, rendered by its literal name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    Locked,
    Unlocked,
    Jammed,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "Locked",
            Self::Unlocked => "Unlocked",
            Self::Jammed => "Jammed",
        }
    }
}

impl std::fmt::Display for LockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved overlay configuration.
///
/// `overlay_type` determines which other fields are meaningful: `text` for
/// `Text` overlays, `device_id` and `prefix` for `Device` overlays, `prefix`
/// for `FaceDetection`. A `Device` overlay with an empty `device_id` behaves
/// as if its type were `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overlay {
    pub id: String,
    pub overlay_type: OverlayType,
    pub device_id: String,
    pub prefix: String,
    pub text: String,
}

/// One detection from an object detection frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub class_name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub score: Option<f32>,
}

/// Object detection frame delivered by the camera's detector stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectsDetected {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Event payload delivered by a device subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Temperature(f64),
    Humidity(f64),
    Lock(LockState),
    Detections(ObjectsDetected),
}

//! EventTranslator - maps event payloads to overlay text
//!
//! Pure functions: listener kind + payload + overlay configuration in,
//! rendered text out. Blank results must be treated as "disable overlay"
//! because the camera firmware does not reliably render blank titles.

use crate::models::{EventPayload, ListenerKind, ObjectsDetected, Overlay};

/// Context the translation needs beyond the payload itself
#[derive(Debug, Clone, Default)]
pub struct TranslateContext {
    /// Unit suffix of the bound thermometer device, if known
    pub temperature_unit: Option<String>,
    /// Most recent face label cached by the detector subscription
    pub last_face_label: Option<String>,
}

/// Camera-side effect of a rendered text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayCommand {
    Update(String),
    Disable,
}

impl OverlayCommand {
    /// Blank or all-whitespace text disables the overlay instead of writing it
    pub fn from_text(text: &str) -> Self {
        if text.trim().is_empty() {
            Self::Disable
        } else {
            Self::Update(text.to_string())
        }
    }
}

/// Render an event payload into overlay text.
///
/// A payload that does not match the listener kind falls back to the
/// overlay's literal text.
pub fn translate(
    kind: ListenerKind,
    payload: &EventPayload,
    overlay: &Overlay,
    ctx: &TranslateContext,
) -> String {
    match (kind, payload) {
        (ListenerKind::Temperature, EventPayload::Temperature(value)) => {
            let number = format_number(*value);
            match ctx.temperature_unit.as_deref().filter(|u| !u.is_empty()) {
                Some(unit) => format!("{}{} {}", overlay.prefix, number, unit),
                None => format!("{}{}", overlay.prefix, number),
            }
        }
        (ListenerKind::Humidity, EventPayload::Humidity(value)) => {
            format!("{}{} %", overlay.prefix, format_number(*value))
        }
        (ListenerKind::Lock, EventPayload::Lock(state)) => {
            format!("{}{}", overlay.prefix, state)
        }
        (ListenerKind::Face, EventPayload::Detections(detected)) => {
            let label = face_label(detected)
                .map(str::to_string)
                .or_else(|| ctx.last_face_label.clone())
                .unwrap_or_else(|| "-".to_string());
            format!("{}{}", overlay.prefix, label)
        }
        _ => overlay.text.clone(),
    }
}

/// First detection with class "face" and a non-empty label
pub fn face_label(detected: &ObjectsDetected) -> Option<&str> {
    detected
        .detections
        .iter()
        .filter(|d| d.class_name == "face")
        .find_map(|d| d.label.as_deref().filter(|l| !l.is_empty()))
}

/// Integral readings render without decimals, everything else with one
pub fn format_number(value: f64) -> String {
    if (value - value.trunc()).abs() < f64::EPSILON {
        format!("{}", value.trunc() as i64)
    } else {
        format!("{value:.1}")
    }
}

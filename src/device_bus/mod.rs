//! DeviceBus - host device and event subscription capability
//!
//! ## Responsibilities
//!
//! - Device lookup by id with an explicit capability set
//! - Event subscriptions returning opaque handles
//!
//! The bus is implemented by the host platform. Device readings are cached
//! host-side state, so the accessors are synchronous; event handlers are
//! synchronous as well and must not block.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{EventPayload, ListenerKind, LockState};
use crate::Result;

/// A device-exposed sensor/actuator interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Thermometer,
    HumiditySensor,
    Lock,
    ObjectDetector,
}

impl Capability {
    /// The listener kind a subscription on this capability feeds
    pub fn listener_kind(self) -> ListenerKind {
        match self {
            Self::Thermometer => ListenerKind::Temperature,
            Self::HumiditySensor => ListenerKind::Humidity,
            Self::Lock => ListenerKind::Lock,
            Self::ObjectDetector => ListenerKind::Face,
        }
    }
}

/// Capability resolution order for `Device` overlays. A device exposing several
/// sensor capabilities binds to the first match in this order.
pub const CAPABILITY_PRIORITY: [Capability; 3] = [
    Capability::Thermometer,
    Capability::HumiditySensor,
    Capability::Lock,
];

/// Opaque handle for one live subscription. Released exclusively through
/// [`DeviceBus::unsubscribe`]; not clonable so a handle cannot be released twice.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Event callback invoked by the bus on every matching event
pub type EventHandler = Arc<dyn Fn(EventPayload) + Send + Sync>;

/// A device visible on the host bus. Readings reflect the host's cached
/// last-known state and return `None` when the device does not expose them.
pub trait SensorDevice: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn capabilities(&self) -> Vec<Capability>;

    fn temperature(&self) -> Option<f64> {
        None
    }

    /// Unit suffix for rendered temperatures, e.g. "C" or "F"
    fn temperature_unit(&self) -> Option<String> {
        None
    }

    fn humidity(&self) -> Option<f64> {
        None
    }

    fn lock_state(&self) -> Option<LockState> {
        None
    }
}

/// Host device/event subscription API
pub trait DeviceBus: Send + Sync {
    /// Look up a device by id
    fn device(&self, device_id: &str) -> Option<Arc<dyn SensorDevice>>;

    /// Subscribe to a device's event stream for one capability
    fn subscribe(
        &self,
        device_id: &str,
        capability: Capability,
        handler: EventHandler,
    ) -> Result<SubscriptionHandle>;

    /// Release a subscription; the handler never fires afterwards
    fn unsubscribe(&self, handle: SubscriptionHandle);
}

//! Shared in-memory doubles for the host bus and the camera client
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use osd_bridge::camera_client::CameraClient;
use osd_bridge::device_bus::{
    Capability, DeviceBus, EventHandler, SensorDevice, SubscriptionHandle,
};
use osd_bridge::models::{EventPayload, LockState};
use osd_bridge::{Error, Result};

pub struct MockDevice {
    id: String,
    name: String,
    capabilities: Vec<Capability>,
    temperature: Mutex<Option<f64>>,
    temperature_unit: Mutex<Option<String>>,
    humidity: Mutex<Option<f64>>,
    lock_state: Mutex<Option<LockState>>,
}

impl MockDevice {
    pub fn new(id: &str, capabilities: Vec<Capability>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            name: format!("device {id}"),
            capabilities,
            temperature: Mutex::new(None),
            temperature_unit: Mutex::new(None),
            humidity: Mutex::new(None),
            lock_state: Mutex::new(None),
        })
    }

    pub fn thermometer(id: &str, temperature: f64, unit: &str) -> Arc<Self> {
        let device = Self::new(id, vec![Capability::Thermometer]);
        *device.temperature.lock().unwrap() = Some(temperature);
        *device.temperature_unit.lock().unwrap() = Some(unit.to_string());
        device
    }

    pub fn hygrometer(id: &str, humidity: f64) -> Arc<Self> {
        let device = Self::new(id, vec![Capability::HumiditySensor]);
        *device.humidity.lock().unwrap() = Some(humidity);
        device
    }

    pub fn lock(id: &str, state: LockState) -> Arc<Self> {
        let device = Self::new(id, vec![Capability::Lock]);
        *device.lock_state.lock().unwrap() = Some(state);
        device
    }

    pub fn set_temperature(&self, value: f64) {
        *self.temperature.lock().unwrap() = Some(value);
    }
}

impl SensorDevice for MockDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<Capability> {
        self.capabilities.clone()
    }

    fn temperature(&self) -> Option<f64> {
        *self.temperature.lock().unwrap()
    }

    fn temperature_unit(&self) -> Option<String> {
        self.temperature_unit.lock().unwrap().clone()
    }

    fn humidity(&self) -> Option<f64> {
        *self.humidity.lock().unwrap()
    }

    fn lock_state(&self) -> Option<LockState> {
        *self.lock_state.lock().unwrap()
    }
}

struct Subscription {
    device_id: String,
    capability: Capability,
    handler: EventHandler,
}

/// In-memory device bus with subscription accounting
pub struct MockBus {
    devices: Mutex<HashMap<String, Arc<MockDevice>>>,
    subscriptions: Mutex<HashMap<u64, Subscription>>,
    next_handle: AtomicU64,
    created: AtomicUsize,
    removed: AtomicUsize,
}

impl MockBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            devices: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            created: AtomicUsize::new(0),
            removed: AtomicUsize::new(0),
        })
    }

    pub fn add_device(&self, device: Arc<MockDevice>) {
        self.devices
            .lock()
            .unwrap()
            .insert(device.id().to_string(), device);
    }

    /// Deliver an event to every matching subscription
    pub fn fire(&self, device_id: &str, capability: Capability, payload: EventPayload) {
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.device_id == device_id && s.capability == capability)
            .map(|s| s.handler.clone())
            .collect();
        for handler in handlers {
            handler(payload.clone());
        }
    }

    pub fn active_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    pub fn subscriptions_on(&self, device_id: &str) -> usize {
        self.subscriptions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.device_id == device_id)
            .count()
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn removed_count(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }
}

impl DeviceBus for MockBus {
    fn device(&self, device_id: &str) -> Option<Arc<dyn SensorDevice>> {
        self.devices
            .lock()
            .unwrap()
            .get(device_id)
            .cloned()
            .map(|d| d as Arc<dyn SensorDevice>)
    }

    fn subscribe(
        &self,
        device_id: &str,
        capability: Capability,
        handler: EventHandler,
    ) -> Result<SubscriptionHandle> {
        let raw = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.subscriptions.lock().unwrap().insert(
            raw,
            Subscription {
                device_id: device_id.to_string(),
                capability,
                handler,
            },
        );
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(SubscriptionHandle::new(raw))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if self
            .subscriptions
            .lock()
            .unwrap()
            .remove(&handle.raw())
            .is_some()
        {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraCall {
    Set { overlay_id: String, text: String },
    Disable { overlay_id: String },
}

/// Recording camera client
pub struct MockCamera {
    calls: Mutex<Vec<CameraCall>>,
    config: Mutex<HashMap<String, String>>,
    fail_fetch: AtomicBool,
}

impl MockCamera {
    pub fn new() -> Arc<Self> {
        Self::with_config(&[])
    }

    pub fn with_config(entries: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            config: Mutex::new(
                entries
                    .iter()
                    .map(|(id, text)| (id.to_string(), text.to_string()))
                    .collect(),
            ),
            fail_fetch: AtomicBool::new(false),
        })
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<CameraCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn disable_count(&self, overlay_id: &str) -> usize {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, CameraCall::Disable { overlay_id: id } if id == overlay_id))
            .count()
    }
}

#[async_trait]
impl CameraClient for MockCamera {
    async fn fetch_overlay_config(&self) -> Result<HashMap<String, String>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::Camera("simulated fetch failure".to_string()));
        }
        Ok(self.config.lock().unwrap().clone())
    }

    async fn set_overlay_text(&self, overlay_id: &str, text: &str) -> Result<()> {
        self.calls.lock().unwrap().push(CameraCall::Set {
            overlay_id: overlay_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn disable_overlay_text(&self, overlay_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(CameraCall::Disable {
            overlay_id: overlay_id.to_string(),
        });
        Ok(())
    }
}

/// Wait until the camera has recorded at least `count` calls
pub async fn wait_for_calls(camera: &MockCamera, count: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while camera.calls.lock().unwrap().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("update queue did not drain in time");
}

/// Let any queued camera writes drain
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}

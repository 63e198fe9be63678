//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ninabridge_core::{BridgeConfig, BusTransport, DeviceConfig, Message, Result};
use ninabridge_devices::{
    ApiResult, CommandError, CommandPlan, CommandRequest, DeviceApi, DeviceApiError, DeviceKind,
};
use parking_lot::Mutex;
use serde_json::Value;

/// Scripted device API. Kinds without a scripted answer are unreachable.
#[derive(Default)]
pub struct FakeApi {
    statuses: Mutex<HashMap<DeviceKind, Value>>,
    images: Mutex<HashMap<DeviceKind, Option<Vec<u8>>>>,
    command_result: Mutex<Value>,
    command_delay: Mutex<Duration>,
    pub commands: Mutex<Vec<(String, CommandRequest)>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, kind: DeviceKind, status: Value) {
        self.statuses.lock().insert(kind, status);
    }

    pub fn clear_status(&self, kind: DeviceKind) {
        self.statuses.lock().remove(&kind);
    }

    pub fn set_image(&self, kind: DeviceKind, image: Option<Vec<u8>>) {
        self.images.lock().insert(kind, image);
    }

    pub fn set_command_result(&self, result: Value) {
        *self.command_result.lock() = result;
    }

    /// Make every command call take `delay` before answering.
    pub fn set_command_delay(&self, delay: Duration) {
        *self.command_delay.lock() = delay;
    }
}

#[async_trait]
impl DeviceApi for FakeApi {
    async fn fetch_status(&self, kind: DeviceKind) -> ApiResult<Value> {
        self.statuses
            .lock()
            .get(&kind)
            .cloned()
            .ok_or_else(|| DeviceApiError::Connection("connection refused".to_string()))
    }

    async fn fetch_image(&self, kind: DeviceKind) -> ApiResult<Option<Vec<u8>>> {
        self.images
            .lock()
            .get(&kind)
            .cloned()
            .ok_or(DeviceApiError::Status(503))
    }

    async fn send_command(
        &self,
        device: &str,
        request: &CommandRequest,
    ) -> std::result::Result<Value, CommandError> {
        self.commands
            .lock()
            .push((device.to_string(), request.clone()));
        let delay = *self.command_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        CommandPlan::resolve(device, request)?;
        Ok(self.command_result.lock().clone())
    }
}

/// Transport that records every published message.
#[derive(Default)]
pub struct RecordingTransport {
    published: Mutex<Vec<Message>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.published.lock().clone()
    }

    pub fn on(&self, topic: &str) -> Vec<Message> {
        self.published
            .lock()
            .iter()
            .filter(|m| m.topic() == topic)
            .cloned()
            .collect()
    }

    pub fn texts_on(&self, topic: &str) -> Vec<String> {
        self.on(topic)
            .iter()
            .filter_map(|m| m.payload().as_text().map(str::to_string))
            .collect()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.published
            .lock()
            .iter()
            .filter(|m| m.topic().starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl BusTransport for RecordingTransport {
    async fn publish(&self, message: &Message) -> Result<()> {
        self.published.lock().push(message.clone());
        Ok(())
    }
}

/// Configuration with every device disabled except the given ones.
pub fn config_with(enabled: &[(DeviceKind, i64)]) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    for kind in DeviceKind::ALL {
        config
            .devices
            .insert(kind.as_str().to_string(), DeviceConfig::new(false, 60));
    }
    for (kind, refresh_every) in enabled {
        config
            .devices
            .insert(kind.as_str().to_string(), DeviceConfig::new(true, *refresh_every));
    }
    config
}

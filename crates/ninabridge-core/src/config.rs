//! Bridge configuration.
//!
//! The configuration is a TOML document where every section is optional:
//!
//! ```toml
//! [nina]
//! api_uri = "http://127.0.0.1:1888/v2/api"
//!
//! [mqtt]
//! host = "broker.local"
//!
//! [mqtt.topics]
//! base_topic = "observatory"
//!
//! [devices.camera]
//! refresh_every = 30
//! ```
//!
//! Device names are kept as strings here; resolving them against the set of
//! supported device kinds happens in the devices crate.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config_err;
use crate::error::Result;

/// Default constants.
pub mod defaults {
    pub const NINA_API_URI: &str = "http://127.0.0.1:1888/v2/api";
    pub const NINA_REQUEST_TIMEOUT: u64 = 10;

    pub const MQTT_HOST: &str = "127.0.0.1";
    pub const MQTT_PORT: u16 = 1883;
    pub const MQTT_CLIENT_ID: &str = "nina_mqtt_bridge";
    pub const MQTT_KEEPALIVE: u64 = 60;

    pub const DISCOVERY_PREFIX: &str = "homeassistant";
    pub const BASE_TOPIC: &str = "nina";
    pub const AVAILABILITY_TOPIC: &str = "{base}/{device}/availability";
    pub const COMMAND_TOPIC: &str = "{base}/{device}/command";
    pub const COMMAND_ERROR_TOPIC: &str = "{base}/{device}/command/error";
    pub const COMMAND_RESPONSE_TIMEOUT: u64 = 10;

    pub const DEVICE_ID: &str = "nina_server";
    pub const DEVICE_NAME: &str = "NINA Advanced API";
    pub const DEVICE_MANUFACTURER: &str = "christian-photo";
    pub const DEVICE_MODEL: &str = "NINA Advanced API";

    pub const REFRESH_SECONDS: i64 = 60;

    /// Device slug used for the whole-process availability topic.
    pub const BRIDGE_DEVICE: &str = "bridge";
}

/// Connection settings for the NINA Advanced API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NinaConfig {
    pub api_uri: String,
    /// Per-request timeout for polls, in seconds
    pub request_timeout: u64,
}

impl Default for NinaConfig {
    fn default() -> Self {
        Self {
            api_uri: defaults::NINA_API_URI.to_string(),
            request_timeout: defaults::NINA_REQUEST_TIMEOUT,
        }
    }
}

/// Topic templates. `{base}` and `{device}` are substituted when rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub discovery_prefix: String,
    pub base_topic: String,
    pub availability_topic: String,
    pub command_topic: String,
    pub command_error_topic: String,
    /// Timeout for command calls against the device API, in seconds
    pub command_response_timeout: u64,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            discovery_prefix: defaults::DISCOVERY_PREFIX.to_string(),
            base_topic: defaults::BASE_TOPIC.to_string(),
            availability_topic: defaults::AVAILABILITY_TOPIC.to_string(),
            command_topic: defaults::COMMAND_TOPIC.to_string(),
            command_error_topic: defaults::COMMAND_ERROR_TOPIC.to_string(),
            command_response_timeout: defaults::COMMAND_RESPONSE_TIMEOUT,
        }
    }
}

impl TopicConfig {
    fn render(&self, template: &str, device: &str) -> String {
        template
            .replace("{base}", &self.base_topic)
            .replace("{device}", device)
    }

    /// `{base}/{device}/availability`
    pub fn availability(&self, device: &str) -> String {
        self.render(&self.availability_topic, device)
    }

    /// Availability topic of the bridge process itself.
    pub fn bridge_availability(&self) -> String {
        self.availability(defaults::BRIDGE_DEVICE)
    }

    pub fn command(&self, device: &str) -> String {
        self.render(&self.command_topic, device)
    }

    /// Subscription filter matching the command topic of every device.
    pub fn command_filter(&self) -> String {
        self.command("+")
    }

    pub fn command_error(&self, device: &str) -> String {
        self.render(&self.command_error_topic, device)
    }

    /// `{base}/{device}/{value}`
    pub fn state(&self, device: &str, value: &str) -> String {
        format!("{}/{}/{}", self.base_topic, device, value)
    }

    pub fn command_response(&self, device: &str) -> String {
        self.state(device, "command_response")
    }

    pub fn image(&self, device: &str) -> String {
        self.state(device, "image")
    }

    fn discovery_root(&self) -> &str {
        self.discovery_prefix.trim_end_matches('/')
    }

    /// `{discovery_prefix}/{platform}/{device_id}/{value}/config`
    pub fn value_discovery(&self, platform: &str, device_id: &str, value: &str) -> String {
        format!(
            "{}/{}/{}/{}/config",
            self.discovery_root(),
            platform,
            device_id,
            value
        )
    }

    /// `{discovery_prefix}/camera/{device_id}/config`
    pub fn image_discovery(&self, device_id: &str) -> String {
        format!("{}/camera/{}/config", self.discovery_root(), device_id)
    }

    pub fn command_response_timeout(&self) -> Duration {
        Duration::from_secs(self.command_response_timeout)
    }
}

/// Connection settings for the MQTT broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub client_id: String,
    /// Keep-alive interval in seconds
    pub keepalive: u64,
    pub topics: TopicConfig,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: defaults::MQTT_HOST.to_string(),
            port: defaults::MQTT_PORT,
            username: None,
            password: None,
            client_id: defaults::MQTT_CLIENT_ID.to_string(),
            keepalive: defaults::MQTT_KEEPALIVE,
            topics: TopicConfig::default(),
        }
    }
}

impl MqttConfig {
    pub fn full_broker_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Device identity block announced in discovery payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub device_id: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_id: defaults::DEVICE_ID.to_string(),
            name: defaults::DEVICE_NAME.to_string(),
            manufacturer: defaults::DEVICE_MANUFACTURER.to_string(),
            model: defaults::DEVICE_MODEL.to_string(),
        }
    }
}

/// Polling configuration for one device kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub enabled: bool,
    /// Poll interval in seconds. Must be positive.
    pub refresh_every: i64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_every: defaults::REFRESH_SECONDS,
        }
    }
}

impl DeviceConfig {
    pub fn new(enabled: bool, refresh_every: i64) -> Self {
        Self {
            enabled,
            refresh_every,
        }
    }

    /// Poll interval. Only meaningful after [`BridgeConfig::validate`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.refresh_every.max(1) as u64)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub nina: NinaConfig,
    pub mqtt: MqttConfig,
    pub device_info: DeviceInfo,
    pub devices: BTreeMap<String, DeviceConfig>,
}

impl BridgeConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(config_err!("Config file not found: {}", path.display()));
        }
        let content = std::fs::read_to_string(path)?;
        info!(category = "config", "Loading config from: {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| config_err!("Invalid config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        for (name, device) in &self.devices {
            if device.refresh_every <= 0 {
                return Err(config_err!(
                    "refresh_every must be positive for device '{}'",
                    name
                ));
            }
        }
        if self.mqtt.topics.base_topic.is_empty() {
            return Err(config_err!("mqtt.topics.base_topic must not be empty"));
        }
        if self.mqtt.topics.command_response_timeout == 0 {
            return Err(config_err!("mqtt.topics.command_response_timeout must be positive"));
        }
        Ok(())
    }

    /// Look up a device's polling settings, falling back to defaults.
    pub fn device(&self, name: &str) -> DeviceConfig {
        self.devices.get(name).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config.nina.api_uri, defaults::NINA_API_URI);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topics.base_topic, "nina");
        assert!(config.devices.is_empty());
        assert_eq!(config.device("camera"), DeviceConfig::new(true, 60));
    }

    #[test]
    fn test_topic_rendering() {
        let topics = TopicConfig::default();
        assert_eq!(topics.availability("camera"), "nina/camera/availability");
        assert_eq!(topics.bridge_availability(), "nina/bridge/availability");
        assert_eq!(topics.command_filter(), "nina/+/command");
        assert_eq!(topics.command_error("mount"), "nina/mount/command/error");
        assert_eq!(topics.command_response("mount"), "nina/mount/command_response");
        assert_eq!(topics.state("camera", "temperature"), "nina/camera/temperature");
        assert_eq!(topics.image("screenshot"), "nina/screenshot/image");
        assert_eq!(
            topics.value_discovery("sensor", "nina_server_camera", "temperature"),
            "homeassistant/sensor/nina_server_camera/temperature/config"
        );
    }

    #[test]
    fn test_discovery_prefix_trailing_slash() {
        let topics = TopicConfig {
            discovery_prefix: "ha/".to_string(),
            ..Default::default()
        };
        assert_eq!(topics.image_discovery("x_screenshot"), "ha/camera/x_screenshot/config");
    }

    #[test]
    fn test_non_positive_refresh_rejected() {
        let err = BridgeConfig::from_toml_str("[devices.camera]\nrefresh_every = 0\n").unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("camera"));

        assert!(BridgeConfig::from_toml_str("[devices.mount]\nrefresh_every = -5\n").is_err());
    }
}

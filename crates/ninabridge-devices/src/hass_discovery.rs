//! Home Assistant MQTT discovery payloads.
//!
//! Every value of a device becomes one `sensor` or `binary_sensor` entity;
//! image-producing devices become a single `camera` entity. All entities of
//! one device share a device block so Home Assistant groups them.
//!
//! ```json
//! // Topic: homeassistant/sensor/nina_server_camera/temperature/config
//! {
//!   "name": "Temperature",
//!   "state_topic": "nina/camera/temperature",
//!   "unique_id": "nina_server_camera_temperature",
//!   "availability_topic": "nina/camera/availability",
//!   "payload_available": "ON",
//!   "payload_not_available": "OFF",
//!   "device": {
//!     "identifiers": ["nina_server_camera"],
//!     "name": "NINA Advanced API Camera",
//!     "manufacturer": "christian-photo",
//!     "model": "NINA Advanced API"
//!   },
//!   "unit_of_measurement": "°C",
//!   "device_class": "temperature",
//!   "state_class": "measurement",
//!   "icon": "mdi:thermometer",
//!   "expire_after": 132
//! }
//! ```

use serde::Serialize;

use ninabridge_core::{BridgeConfig, DeviceInfo, Message, QoS, AVAILABILITY_OFF, AVAILABILITY_ON};

use crate::mdl::{title_case, DeviceKind, Platform, ValueDef};

/// Staleness multiplier applied to a device's poll interval.
const EXPIRE_FACTOR: f64 = 2.2;

/// Device block shared by all entities of one device.
#[derive(Debug, Clone, Serialize)]
pub struct HassDeviceBlock {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

/// Discovery payload of a sensor or binary sensor.
#[derive(Debug, Clone, Serialize)]
pub struct SensorDiscovery {
    pub name: String,
    pub state_topic: String,
    pub unique_id: String,
    pub availability_topic: String,
    pub payload_available: &'static str,
    pub payload_not_available: &'static str,
    pub device: HassDeviceBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_after: Option<u64>,
}

/// Discovery payload of an MQTT camera (image) entity.
#[derive(Debug, Clone, Serialize)]
pub struct ImageDiscovery {
    pub name: String,
    pub unique_id: String,
    pub topic: String,
    pub content_type: &'static str,
    pub availability_topic: String,
    pub payload_available: &'static str,
    pub payload_not_available: &'static str,
    pub device: HassDeviceBlock,
}

/// `<device_info.device_id>_<device>`
pub fn device_identifier(info: &DeviceInfo, kind: DeviceKind) -> String {
    format!("{}_{}", info.device_id, kind.as_str())
}

pub fn device_block(info: &DeviceInfo, kind: DeviceKind) -> HassDeviceBlock {
    HassDeviceBlock {
        identifiers: vec![device_identifier(info, kind)],
        name: format!("{} {}", info.name, title_case(kind.as_str())),
        manufacturer: info.manufacturer.clone(),
        model: info.model.clone(),
    }
}

/// Entity definition for a value name that only shows up at runtime,
/// such as an entry of the switch lists.
fn dynamic_value(kind: DeviceKind, name: &str) -> Option<ValueDef> {
    let section = kind
        .descriptor()
        .lists
        .iter()
        .find(|section| name.starts_with(section.prefix))?;
    Some(ValueDef {
        name: "",
        display_name: None,
        unit: None,
        device_class: None,
        state_class: None,
        icon: Some(section.icon),
        aliases: &[],
        platform: Platform::Sensor,
    })
}

/// Entity name of a declared value: its display name, or `<Device> <Value>`.
fn entity_name(kind: DeviceKind, def: &ValueDef) -> String {
    match def.display_name {
        Some(display) => display.to_string(),
        None => format!("{} {}", title_case(kind.as_str()), title_case(def.name)),
    }
}

fn sensor_message(
    config: &BridgeConfig,
    kind: DeviceKind,
    value: &str,
    name: String,
    def: &ValueDef,
    refresh_every: i64,
) -> Option<Message> {
    let topics = &config.mqtt.topics;
    let device_id = device_identifier(&config.device_info, kind);
    let is_binary = def.platform == Platform::BinarySensor;

    let expire_after = (refresh_every > 0).then(|| (refresh_every as f64 * EXPIRE_FACTOR) as u64);

    let payload = SensorDiscovery {
        name,
        state_topic: topics.state(kind.as_str(), value),
        unique_id: format!("{}_{}", device_id, value),
        availability_topic: topics.availability(kind.as_str()),
        payload_available: AVAILABILITY_ON,
        payload_not_available: AVAILABILITY_OFF,
        device: device_block(&config.device_info, kind),
        payload_on: is_binary.then_some("true"),
        payload_off: is_binary.then_some("false"),
        unit_of_measurement: def.unit,
        device_class: def.device_class,
        state_class: def.state_class,
        icon: def.icon,
        expire_after,
    };

    let topic = topics.value_discovery(def.platform.as_str(), &device_id, value);
    discovery_message(topic, &payload)
}

fn image_message(config: &BridgeConfig, kind: DeviceKind) -> Option<Message> {
    let topics = &config.mqtt.topics;
    let device_id = device_identifier(&config.device_info, kind);

    let payload = ImageDiscovery {
        name: format!("NINA {}", title_case(kind.as_str())),
        unique_id: device_id.clone(),
        topic: topics.image(kind.as_str()),
        content_type: "image/jpeg",
        availability_topic: topics.availability(kind.as_str()),
        payload_available: AVAILABILITY_ON,
        payload_not_available: AVAILABILITY_OFF,
        device: device_block(&config.device_info, kind),
    };

    discovery_message(topics.image_discovery(&device_id), &payload)
}

fn discovery_message(topic: String, payload: &impl Serialize) -> Option<Message> {
    match serde_json::to_string(payload) {
        Ok(json) => Some(
            Message::new(topic, json)
                .retained(true)
                .with_qos(QoS::AtLeastOnce),
        ),
        Err(e) => {
            tracing::warn!(topic = %topic, error = %e, "Failed to serialize discovery payload");
            None
        }
    }
}

/// Discovery messages for a device: every declared value plus any extra
/// runtime names that belong to one of its list sections. Image kinds get
/// exactly one camera entity.
pub fn discovery_messages<'a>(
    config: &BridgeConfig,
    kind: DeviceKind,
    refresh_every: i64,
    extra: impl IntoIterator<Item = &'a str>,
) -> Vec<Message> {
    let descriptor = kind.descriptor();
    if descriptor.produces_image() {
        return image_message(config, kind).into_iter().collect();
    }

    let mut messages: Vec<Message> = descriptor
        .values
        .iter()
        .filter_map(|def| {
            sensor_message(config, kind, def.name, entity_name(kind, def), def, refresh_every)
        })
        .collect();

    for name in extra {
        if descriptor.value(name).is_some() {
            continue;
        }
        if let Some(def) = dynamic_value(kind, name) {
            let entity = title_case(name);
            messages.extend(sensor_message(config, kind, name, entity, &def, refresh_every));
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const NO_EXTRA: [&str; 0] = [];

    fn payload_json(message: &Message) -> Value {
        serde_json::from_slice(message.payload().as_bytes()).unwrap()
    }

    fn find<'m>(messages: &'m [Message], topic: &str) -> &'m Message {
        messages
            .iter()
            .find(|m| m.topic() == topic)
            .unwrap_or_else(|| panic!("no message on {}", topic))
    }

    #[test]
    fn test_camera_temperature_payload() {
        let config = BridgeConfig::default();
        let messages = discovery_messages(&config, DeviceKind::Camera, 30, NO_EXTRA);
        assert_eq!(messages.len(), DeviceKind::Camera.descriptor().values.len());

        let message = find(
            &messages,
            "homeassistant/sensor/nina_server_camera/temperature/config",
        );
        assert!(message.retain());
        assert_eq!(message.qos(), QoS::AtLeastOnce);
        assert_eq!(
            payload_json(message),
            json!({
                "name": "Temperature",
                "state_topic": "nina/camera/temperature",
                "unique_id": "nina_server_camera_temperature",
                "availability_topic": "nina/camera/availability",
                "payload_available": "ON",
                "payload_not_available": "OFF",
                "device": {
                    "identifiers": ["nina_server_camera"],
                    "name": "NINA Advanced API Camera",
                    "manufacturer": "christian-photo",
                    "model": "NINA Advanced API"
                },
                "unit_of_measurement": "°C",
                "device_class": "temperature",
                "state_class": "measurement",
                "icon": "mdi:thermometer",
                "expire_after": 66
            })
        );
    }

    #[test]
    fn test_binary_sensor_payload() {
        let config = BridgeConfig::default();
        let messages = discovery_messages(&config, DeviceKind::Camera, 60, NO_EXTRA);
        let message = find(
            &messages,
            "homeassistant/binary_sensor/nina_server_camera/connected/config",
        );
        let payload = payload_json(message);
        assert_eq!(payload["payload_on"], "true");
        assert_eq!(payload["payload_off"], "false");
        assert_eq!(payload["device_class"], "connectivity");
        assert_eq!(payload["expire_after"], 132);
        assert!(payload.get("unit_of_measurement").is_none());
    }

    #[test]
    fn test_image_payload() {
        let config = BridgeConfig::default();
        let messages = discovery_messages(&config, DeviceKind::MostRecentImage, 60, NO_EXTRA);
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].topic(),
            "homeassistant/camera/nina_server_most_recent_image/config"
        );
        let payload = payload_json(&messages[0]);
        assert_eq!(payload["name"], "NINA Most Recent Image");
        assert_eq!(payload["topic"], "nina/most_recent_image/image");
        assert_eq!(payload["content_type"], "image/jpeg");
        assert_eq!(payload["device"]["name"], "NINA Advanced API Most Recent Image");
    }

    #[test]
    fn test_dynamic_switch_values() {
        let config = BridgeConfig::default();
        let base = discovery_messages(&config, DeviceKind::Switch, 60, NO_EXTRA).len();
        let messages = discovery_messages(
            &config,
            DeviceKind::Switch,
            60,
            ["connected", "readonly_switch_0_value", "bogus_key"],
        );
        assert_eq!(messages.len(), base + 1);

        let message = find(
            &messages,
            "homeassistant/sensor/nina_server_switch/readonly_switch_0_value/config",
        );
        let payload = payload_json(message);
        assert_eq!(payload["name"], "Readonly Switch 0 Value");
        assert_eq!(payload["icon"], "mdi:toggle-switch");
        assert_eq!(payload["state_topic"], "nina/switch/readonly_switch_0_value");
    }

    #[test]
    fn test_entity_name_falls_back_to_device_and_value() {
        let mut def = ValueDef::sensor("heater_power", "Dew Heater Power");
        assert_eq!(entity_name(DeviceKind::Switch, &def), "Dew Heater Power");

        def.display_name = None;
        assert_eq!(entity_name(DeviceKind::Switch, &def), "Switch Heater Power");
        assert_eq!(entity_name(DeviceKind::MostRecentImage, &def), "Most Recent Image Heater Power");
    }

    #[test]
    fn test_extra_names_ignored_for_kinds_without_lists() {
        let config = BridgeConfig::default();
        let base = discovery_messages(&config, DeviceKind::Mount, 60, NO_EXTRA).len();
        let with_extra = discovery_messages(&config, DeviceKind::Mount, 60, ["readonly_switch_0_name"]);
        assert_eq!(base, with_extra.len());
    }
}

//! Configuration file loading tests.

use std::io::Write;

use ninabridge_core::config::BridgeConfig;
use ninabridge_core::error::Error;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_config_file() {
    let file = write_config(
        r#"
[nina]
api_uri = "http://nina.local:1888/v2/api"

[mqtt]
host = "broker.local"
port = 8883
username = "bridge"
password = "secret"
client_id = "observatory_bridge"
keepalive = 30

[mqtt.topics]
base_topic = "observatory"
discovery_prefix = "ha"
command_response_timeout = 20

[device_info]
device_id = "rig1"
name = "Rig One"

[devices.camera]
enabled = true
refresh_every = 30

[devices.screenshot]
enabled = false
"#,
    );

    let config = BridgeConfig::from_file(file.path()).unwrap();
    assert_eq!(config.nina.api_uri, "http://nina.local:1888/v2/api");
    assert_eq!(config.mqtt.full_broker_addr(), "broker.local:8883");
    assert_eq!(config.mqtt.username.as_deref(), Some("bridge"));
    assert_eq!(config.mqtt.keepalive, 30);
    assert_eq!(config.mqtt.topics.base_topic, "observatory");
    assert_eq!(config.mqtt.topics.availability("camera"), "observatory/camera/availability");
    assert_eq!(config.mqtt.topics.command_response_timeout, 20);
    assert_eq!(config.device_info.device_id, "rig1");
    // Unset fields keep their defaults.
    assert_eq!(config.device_info.manufacturer, "christian-photo");

    let camera = config.device("camera");
    assert!(camera.enabled);
    assert_eq!(camera.interval().as_secs(), 30);

    let screenshot = config.device("screenshot");
    assert!(!screenshot.enabled);
    assert_eq!(screenshot.refresh_every, 60);
}

#[test]
fn test_missing_file_is_config_error() {
    let err = BridgeConfig::from_file("/nonexistent/nina-bridge.toml").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let file = write_config("[mqtt\nport = ");
    let err = BridgeConfig::from_file(file.path()).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_negative_refresh_aborts_load() {
    let file = write_config("[devices.weather]\nrefresh_every = -1\n");
    let err = BridgeConfig::from_file(file.path()).unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("weather"));
}

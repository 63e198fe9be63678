//! NINA device support for the MQTT bridge.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `http` | ✅ | reqwest client for the NINA Advanced API |
//! | `mqtt` | ✅ | rumqttc MQTT transport |
//!
//! ## Architecture
//!
//! - **mdl**: closed set of device kinds and their static descriptors
//! - **DeviceRegistry**: configured devices resolved against the kinds
//! - **StateExtractor**: raw status documents to named values
//! - **DeviceApi**: the NINA API seam, implemented by `NinaClient`
//! - **CommandRouter**: inbound commands to API calls and result topics
//! - **Bridge**: per-device poll tasks, discovery and lifecycle

pub mod adapter;
pub mod adapters;
pub mod bridge;
pub mod command;
pub mod extractor;
pub mod hass_discovery;
pub mod mdl;
pub mod registry;
pub mod router;

pub use adapter::{ApiResult, DeviceApi, DeviceApiError};
pub use bridge::{format_state, Bridge};
pub use command::{CommandError, CommandPlan, CommandRequest};
pub use extractor::{StateExtractor, StateValues};
pub use mdl::{DeviceDescriptor, DeviceKind, Platform, ValueDef};
pub use registry::{ConfiguredDevice, DeviceRegistry};
pub use router::{CommandRouter, RouteOutcome, COMMAND_QUEUE_CAPACITY};

#[cfg(feature = "http")]
pub use adapters::NinaClient;
#[cfg(feature = "mqtt")]
pub use adapters::MqttTransport;

//! Concrete collaborators of the bridge.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `http` | reqwest client for the NINA Advanced API (default) |
//! | `mqtt` | rumqttc transport for the MQTT broker (default) |

// NINA HTTP client (feature-gated)
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::NinaClient;

// MQTT transport (feature-gated)
#[cfg(feature = "mqtt")]
pub mod mqtt;
#[cfg(feature = "mqtt")]
pub use mqtt::{topic_matches, MqttTransport};

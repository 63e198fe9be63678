//! Core types for the NINA to MQTT bridge.
//!
//! This crate holds the protocol-agnostic engine pieces:
//! - **Scheduler**: single-loop, serial execution of recurring poll tasks
//! - **PublishPipeline**: unbounded FIFO drained to the bus by one consumer
//! - **DiscoveryRegistry**: at-most-once announcement of discovery topics
//! - configuration, messages and the error taxonomy shared by all crates

pub mod config;
pub mod discovery;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod scheduler;

pub use config::{BridgeConfig, DeviceConfig, DeviceInfo, MqttConfig, NinaConfig, TopicConfig};
pub use discovery::DiscoveryRegistry;
pub use error::{Error, Result};
pub use message::{InboundMessage, Message, Payload, QoS};
pub use pipeline::{BusTransport, MessageSender, PipelineStats, PublishPipeline};
pub use scheduler::{ScheduledTask, Scheduler, TaskAction};

/// Availability payload for a reachable device.
pub const AVAILABILITY_ON: &str = "ON";

/// Availability payload for an unreachable device.
pub const AVAILABILITY_OFF: &str = "OFF";

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build an availability message: retained, QoS 1.
pub fn availability_message(topic: impl Into<String>, online: bool) -> Message {
    let payload = if online { AVAILABILITY_ON } else { AVAILABILITY_OFF };
    Message::new(topic, payload)
        .retained(true)
        .with_qos(QoS::AtLeastOnce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_availability_message() {
        let msg = availability_message("nina/bridge/availability", false);
        assert_eq!(msg.payload().as_text(), Some("OFF"));
        assert!(msg.retain());
        assert_eq!(msg.qos(), QoS::AtLeastOnce);
    }
}

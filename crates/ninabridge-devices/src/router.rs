//! Inbound command routing.
//!
//! The MQTT transport feeds command publishes into a bounded channel; the
//! router drains it on its own task, one command at a time. Every payload
//! that parses as JSON yields at most one outbound message: the JSON result
//! on `{base}/{device}/command_response` or the failure text on
//! `{base}/{device}/command/error`. Only an empty result publishes nothing.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use ninabridge_core::{InboundMessage, Message, MessageSender, TopicConfig};

use crate::adapter::DeviceApi;
use crate::command::{is_empty_result, CommandRequest};

/// Capacity of the inbound command channel.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// What handling one inbound message produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Unparseable payload or topic; nothing published.
    Dropped,
    /// Command succeeded with an empty result; nothing published.
    Silent,
    /// Result published on the response topic.
    Responded,
    /// Failure published on the error topic.
    Failed,
}

/// Dispatches inbound commands to the device API.
pub struct CommandRouter {
    api: Arc<dyn DeviceApi>,
    sender: MessageSender,
    topics: TopicConfig,
}

impl CommandRouter {
    pub fn new(api: Arc<dyn DeviceApi>, sender: MessageSender, topics: TopicConfig) -> Self {
        Self {
            api,
            sender,
            topics,
        }
    }

    /// Handle one inbound message.
    pub async fn handle(&self, message: InboundMessage) -> RouteOutcome {
        let Some(device) = device_from_topic(&message.topic) else {
            warn!(topic = %message.topic, "Command topic has no device segment, dropped");
            return RouteOutcome::Dropped;
        };

        let payload = match CommandRequest::decode(&message.topic, &message.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Dropping command");
                return RouteOutcome::Dropped;
            }
        };

        info!(device = %device, payload = %payload, "Command received");
        let result = match CommandRequest::from_value(payload) {
            Ok(request) => self.api.send_command(device, &request).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(result) if is_empty_result(&result) => {
                debug!(device = %device, "Command returned no result");
                RouteOutcome::Silent
            }
            Ok(result) => {
                let payload = result.to_string();
                self.sender
                    .enqueue(Message::new(self.topics.command_response(device), payload));
                RouteOutcome::Responded
            }
            Err(e) => {
                let detail = e.to_string();
                warn!(error = %e.into_dispatch_error(device), "Command failed");
                self.sender
                    .enqueue(Message::new(self.topics.command_error(device), detail));
                RouteOutcome::Failed
            }
        }
    }

    /// Consume commands until the channel closes or `stop` flips to true.
    ///
    /// A command already being handled always completes, so its response or
    /// error is enqueued before the router exits. Dropping the stop sender
    /// also stops the router.
    pub async fn run(
        self,
        mut rx: mpsc::Receiver<InboundMessage>,
        mut stop: watch::Receiver<bool>,
    ) {
        debug!("Command router started");
        loop {
            let message = tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            self.handle(message).await;
        }
        debug!("Command router stopped");
    }
}

/// The device is the second-to-last topic level: `nina/mount/command`.
pub fn device_from_topic(topic: &str) -> Option<&str> {
    let mut levels = topic.rsplit('/');
    levels.next()?;
    levels.next().filter(|device| !device.is_empty())
}

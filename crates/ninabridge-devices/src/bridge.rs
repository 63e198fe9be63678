//! The bridge orchestrator.
//!
//! [`Bridge`] owns the publish pipeline, the discovery registry and the
//! scheduler. It creates one `poll_<device>` task per enabled device:
//!
//! - value devices: fetch status, extract values, announce discovery for
//!   names not seen before, publish each non-null value (retained), then
//!   availability `ON`
//! - image devices: fetch bytes, publish them on the image topic, then
//!   availability `ON`; no image means availability `OFF`
//!
//! A failed fetch publishes availability `OFF`; the task keeps its schedule.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use ninabridge_core::{
    availability_message, BridgeConfig, BusTransport, DiscoveryRegistry, Error, InboundMessage,
    Message, MessageSender, PipelineStats, PublishPipeline, Result, ScheduledTask, Scheduler,
};

use crate::adapter::DeviceApi;
use crate::extractor::StateExtractor;
use crate::hass_discovery::discovery_messages;
use crate::mdl::DeviceKind;
use crate::registry::{ConfiguredDevice, DeviceRegistry};
use crate::router::CommandRouter;

/// State payload of an extracted value. Nulls are never published.
pub fn format_state(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Everything a poll task needs, shared between all tasks.
struct PollContext {
    config: Arc<BridgeConfig>,
    api: Arc<dyn DeviceApi>,
    sender: MessageSender,
    discovery: Arc<DiscoveryRegistry>,
    extractor: StateExtractor,
}

impl PollContext {
    /// Enqueue the discovery messages of `device` that were never sent.
    fn announce<'a>(&self, device: &ConfiguredDevice, extra: impl IntoIterator<Item = &'a str>) {
        let messages = discovery_messages(
            &self.config,
            device.kind,
            device.config.refresh_every,
            extra,
        );
        for message in messages {
            if self.discovery.announce(message.topic()) {
                debug!(device = %device.kind, topic = %message.topic(), "Announcing discovery");
                self.sender.enqueue(message);
            }
        }
    }

    fn availability(&self, kind: DeviceKind, online: bool) {
        let topic = self.config.mqtt.topics.availability(kind.as_str());
        self.sender.enqueue(availability_message(topic, online));
    }

    async fn poll(&self, device: ConfiguredDevice) -> Result<()> {
        if device.kind.produces_image() {
            self.poll_image(device).await
        } else {
            self.poll_values(device).await
        }
    }

    async fn poll_values(&self, device: ConfiguredDevice) -> Result<()> {
        let kind = device.kind;
        debug!(device = %kind, "Polling device status");

        let status = match self.api.fetch_status(kind).await {
            Ok(status) => status,
            Err(e) => {
                self.availability(kind, false);
                return Err(Error::DeviceFetch {
                    device: kind.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let values = self.extractor.extract(kind, &status);
        self.announce(&device, values.keys().map(String::as_str));

        let topics = &self.config.mqtt.topics;
        for (name, value) in &values {
            if let Some(payload) = format_state(value) {
                let message = Message::new(topics.state(kind.as_str(), name), payload).retained(true);
                self.sender.enqueue(message);
            }
        }
        self.availability(kind, true);
        Ok(())
    }

    async fn poll_image(&self, device: ConfiguredDevice) -> Result<()> {
        let kind = device.kind;
        debug!(device = %kind, "Polling image");

        match self.api.fetch_image(kind).await {
            Ok(Some(bytes)) => {
                let topic = self.config.mqtt.topics.image(kind.as_str());
                self.sender.enqueue(Message::new(topic, bytes));
                self.availability(kind, true);
                Ok(())
            }
            Ok(None) => {
                debug!(device = %kind, "No image available");
                self.availability(kind, false);
                Ok(())
            }
            Err(e) => {
                self.availability(kind, false);
                Err(Error::DeviceFetch {
                    device: kind.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Extra wait for the router beyond the command timeout itself.
const ROUTER_STOP_GRACE: Duration = Duration::from_secs(1);

/// Running command router.
struct RouterHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Wires device polling, discovery and command handling to the bus.
pub struct Bridge {
    config: Arc<BridgeConfig>,
    registry: DeviceRegistry,
    context: Arc<PollContext>,
    pipeline: PublishPipeline,
    scheduler: Scheduler,
    router: Option<RouterHandle>,
    started: bool,
    stopped: bool,
}

impl Bridge {
    /// Build the bridge and its poll tasks. Must be called inside a tokio
    /// runtime, since the publish pipeline starts immediately.
    pub fn new(
        config: BridgeConfig,
        api: Arc<dyn DeviceApi>,
        transport: Arc<dyn BusTransport>,
    ) -> Result<Self> {
        config.validate()?;
        let registry = DeviceRegistry::from_config(&config)?;
        let config = Arc::new(config);
        let pipeline = PublishPipeline::start(transport);

        let context = Arc::new(PollContext {
            config: config.clone(),
            api,
            sender: pipeline.sender(),
            discovery: Arc::new(DiscoveryRegistry::new()),
            extractor: StateExtractor::new(),
        });

        let mut scheduler = Scheduler::new();
        for device in registry.enabled().copied() {
            let ctx = context.clone();
            let task = ScheduledTask::new(
                format!("poll_{}", device.kind),
                device.config.interval(),
                move || {
                    let ctx = ctx.clone();
                    async move { ctx.poll(device).await }
                },
            )?;
            scheduler.add(task)?;
        }

        Ok(Self {
            config,
            registry,
            context,
            pipeline,
            scheduler,
            router: None,
            started: false,
            stopped: false,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn discovery(&self) -> &DiscoveryRegistry {
        &self.context.discovery
    }

    /// Names of the scheduled poll tasks.
    pub fn task_names(&self) -> Vec<String> {
        self.scheduler.task_names()
    }

    /// Producer handle into the publish pipeline.
    pub fn sender(&self) -> MessageSender {
        self.pipeline.sender()
    }

    /// Announce the bridge, publish startup discovery, start the command
    /// router on `commands` and begin polling. Calling it twice is a no-op.
    pub fn start(&mut self, commands: mpsc::Receiver<InboundMessage>) {
        if self.started {
            debug!("Bridge already started");
            return;
        }
        self.started = true;

        let topics = &self.config.mqtt.topics;
        self.pipeline
            .enqueue(availability_message(topics.bridge_availability(), true));

        for device in self.registry.enabled() {
            self.context.announce(device, std::iter::empty());
        }

        let router = CommandRouter::new(
            self.context.api.clone(),
            self.pipeline.sender(),
            topics.clone(),
        );
        let (stop_tx, stop_rx) = watch::channel(false);
        let join = tokio::spawn(router.run(commands, stop_rx));
        self.router = Some(RouterHandle { stop_tx, join });

        self.scheduler.start();
        info!(
            devices = self.registry.enabled().count(),
            discovery = self.context.discovery.len(),
            "Bridge started"
        );
    }

    /// Stop polling, let the router finish its in-flight command, mark every
    /// enabled device and the bridge `OFF`, then drain the pipeline.
    ///
    /// A bridge that never started publishes no `OFF` messages. Calling it
    /// twice is a no-op.
    pub async fn stop(&mut self) -> Result<PipelineStats> {
        if self.started && !self.stopped {
            self.stopped = true;
            if let Err(e) = self.scheduler.stop().await {
                warn!(error = %e, "Scheduler did not stop cleanly");
            }
            self.stop_router().await;

            for device in self.registry.enabled() {
                self.context.availability(device.kind, false);
            }
            let topics = &self.config.mqtt.topics;
            self.pipeline
                .enqueue(availability_message(topics.bridge_availability(), false));
        }

        let stats = self.pipeline.shutdown().await?;
        info!(published = stats.published, failed = stats.failed, "Bridge stopped");
        Ok(stats)
    }

    /// Signal the router and wait for it, bounded by the command timeout.
    async fn stop_router(&mut self) {
        let Some(RouterHandle { stop_tx, mut join }) = self.router.take() else {
            return;
        };
        let _ = stop_tx.send(true);

        let timeout = self.config.mqtt.topics.command_response_timeout() + ROUTER_STOP_GRACE;
        match tokio::time::timeout(timeout, &mut join).await {
            Ok(Ok(())) => debug!("Command router stopped"),
            Ok(Err(e)) => warn!(error = %e, "Command router task failed"),
            Err(_) => {
                warn!(timeout = ?timeout, "Command router did not stop, aborting");
                join.abort();
            }
        }
    }
}

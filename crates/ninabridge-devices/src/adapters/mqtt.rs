//! MQTT transport built on rumqttc.
//!
//! Outbound messages from the publish pipeline go through
//! [`BusTransport::publish`]. A background task drives the rumqttc event
//! loop: it (re)subscribes to the command filter on every `ConnAck` and
//! forwards matching publishes into a bounded channel read by the command
//! router. The bridge availability topic is registered as last will, so the
//! broker reports `OFF` if the process dies without a clean shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use ninabridge_core::{
    BusTransport, Error, InboundMessage, Message, MqttConfig, QoS, Result, AVAILABILITY_OFF,
};

/// Capacity of the rumqttc request channel.
const REQUEST_CAPACITY: usize = 64;

/// Largest packet accepted or sent; image payloads can be several MB.
const MAX_PACKET_SIZE: usize = 10 * 1024 * 1024;

/// Pause after an event loop error before polling again.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long [`MqttTransport::disconnect`] waits for the event loop to exit.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// rumqttc-backed [`BusTransport`].
pub struct MqttTransport {
    client: AsyncClient,
    broker_addr: String,
    stopping: Arc<AtomicBool>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Create the client and spawn its event loop. Connection happens in the
    /// background; publishes queue up until the broker accepts us.
    pub fn connect(config: &MqttConfig, inbound: mpsc::Sender<InboundMessage>) -> Self {
        let topics = &config.topics;
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keepalive.max(5)));
        options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
        options.set_last_will(LastWill::new(
            topics.bridge_availability(),
            AVAILABILITY_OFF,
            rumqttc::QoS::AtLeastOnce,
            true,
        ));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let stopping = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            topics.command_filter(),
            inbound,
            stopping.clone(),
        ));

        let broker_addr = config.full_broker_addr();
        info!(broker = %broker_addr, client_id = %config.client_id, "MQTT transport started");

        Self {
            client,
            broker_addr,
            stopping,
            event_loop: Mutex::new(Some(handle)),
        }
    }

    pub fn broker_addr(&self) -> &str {
        &self.broker_addr
    }

    /// Send a clean DISCONNECT and stop the event loop.
    pub async fn disconnect(&self) {
        let Some(mut handle) = self.event_loop.lock().await.take() else {
            return;
        };
        self.stopping.store(true, Ordering::SeqCst);

        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "MQTT disconnect request failed");
        }
        if tokio::time::timeout(DISCONNECT_TIMEOUT, &mut handle).await.is_err() {
            warn!(broker = %self.broker_addr, "MQTT event loop did not stop, aborting");
            handle.abort();
        }
        info!(broker = %self.broker_addr, "MQTT transport disconnected");
    }
}

#[async_trait]
impl BusTransport for MqttTransport {
    async fn publish(&self, message: &Message) -> Result<()> {
        self.client
            .publish(
                message.topic(),
                to_mqtt_qos(message.qos()),
                message.retain(),
                message.payload().as_bytes().to_vec(),
            )
            .await
            .map_err(|e| Error::Transport {
                topic: message.topic().to_string(),
                message: e.to_string(),
            })
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    command_filter: String,
    inbound: mpsc::Sender<InboundMessage>,
    stopping: Arc<AtomicBool>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(filter = %command_filter, "MQTT connected, subscribing to commands");
                if let Err(e) = client.try_subscribe(&command_filter, rumqttc::QoS::AtMostOnce) {
                    error!(filter = %command_filter, error = %e, "Command subscription failed");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if !topic_matches(&command_filter, &publish.topic) {
                    continue;
                }
                let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                match inbound.try_send(message) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(message)) => {
                        warn!(topic = %message.topic, "Command queue full, command dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(message)) => {
                        debug!(topic = %message.topic, "Command router gone, command dropped");
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(e) => {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                warn!(error = %e, "MQTT connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
    debug!("MQTT event loop exited");
}

/// MQTT topic filter matching with `+` and `#` wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

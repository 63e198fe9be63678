//! Publish pipeline.
//!
//! Producers (poll tasks, the command router, lifecycle code) push
//! [`Message`]s into an unbounded FIFO; a single consumer task drains it to
//! the [`BusTransport`]. Messages from one producer keep their relative
//! order. A failed publish is logged and the message dropped.
//!
//! [`PublishPipeline::shutdown`] lets the consumer finish everything that
//! was enqueued before the shutdown signal was observed, then exits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::message::Message;

/// How long [`PublishPipeline::shutdown`] waits for the drain by default.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound side of the message bus.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Publish one message. Errors are reported as [`Error::Transport`].
    async fn publish(&self, message: &Message) -> Result<()>;
}

/// Cloneable producer handle.
#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<Message>,
}

impl MessageSender {
    /// Queue a message. Never blocks.
    pub fn enqueue(&self, message: Message) {
        if let Err(e) = self.tx.send(message) {
            debug!(topic = %e.0.topic(), "Pipeline closed, message dropped");
        }
    }
}

/// FIFO queue plus its single consumer.
pub struct PublishPipeline {
    sender: MessageSender,
    shutdown_tx: watch::Sender<bool>,
    consumer: Mutex<Option<JoinHandle<PipelineStats>>>,
}

/// Counters reported by the consumer when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub published: u64,
    pub failed: u64,
}

impl PublishPipeline {
    /// Create the queue and spawn its consumer.
    pub fn start(transport: Arc<dyn BusTransport>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let consumer = tokio::spawn(consume(rx, shutdown_rx, transport));
        info!("Publish pipeline started");

        Self {
            sender: MessageSender { tx },
            shutdown_tx,
            consumer: Mutex::new(Some(consumer)),
        }
    }

    /// Queue a message. Never blocks.
    pub fn enqueue(&self, message: Message) {
        self.sender.enqueue(message);
    }

    /// Producer handle that can be moved into tasks.
    pub fn sender(&self) -> MessageSender {
        self.sender.clone()
    }

    /// Stop the consumer after draining, waiting up to [`DRAIN_TIMEOUT`].
    pub async fn shutdown(&self) -> Result<PipelineStats> {
        self.shutdown_with_timeout(DRAIN_TIMEOUT).await
    }

    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<PipelineStats> {
        let Some(consumer) = self.consumer.lock().await.take() else {
            return Ok(PipelineStats::default());
        };
        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(timeout, consumer).await {
            Ok(Ok(stats)) => {
                info!(
                    published = stats.published,
                    failed = stats.failed,
                    "Publish pipeline drained"
                );
                Ok(stats)
            }
            Ok(Err(e)) => Err(Error::Pipeline(format!("Publish consumer failed: {}", e))),
            Err(_) => Err(Error::Pipeline(format!(
                "Publish pipeline did not drain within {:?}",
                timeout
            ))),
        }
    }
}

async fn consume(
    mut rx: mpsc::UnboundedReceiver<Message>,
    mut shutdown_rx: watch::Receiver<bool>,
    transport: Arc<dyn BusTransport>,
) -> PipelineStats {
    let mut stats = PipelineStats::default();

    loop {
        tokio::select! {
            biased;
            message = rx.recv() => match message {
                Some(message) => publish_one(transport.as_ref(), &message, &mut stats).await,
                None => break,
            },
            _ = shutdown_rx.changed() => {
                // Drain whatever is already queued, then stop.
                while let Ok(message) = rx.try_recv() {
                    publish_one(transport.as_ref(), &message, &mut stats).await;
                }
                break;
            }
        }
    }

    debug!("Publish consumer exited");
    stats
}

async fn publish_one(transport: &dyn BusTransport, message: &Message, stats: &mut PipelineStats) {
    trace!(
        topic = %message.topic(),
        retain = message.retain(),
        qos = message.qos().level(),
        "Publishing"
    );
    match transport.publish(message).await {
        Ok(()) => stats.published += 1,
        Err(e) => {
            stats.failed += 1;
            warn!(topic = %message.topic(), error = %e, "Publish failed, message dropped");
        }
    }
}

//! Connection-resilient segment consumer.
//!
//! The connect → channel → qos → consume lifecycle is a flat loop with a
//! single transition out: any failure tears the connection down and retries
//! after the configured interval. Deliveries are dispatched to their own
//! tasks; acknowledgement follows the processing outcome (ack on success,
//! nack + requeue on error).

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::BrokerConfig;
use crate::error::QueueResult;

/// Processes one delivery worth of message bytes.
///
/// `Ok` acknowledges the delivery; `Err` requeues it.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    async fn process(&self, body: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

enum ConsumeExit {
    Shutdown,
    ConnectionLost,
}

/// Segment-queue consumer.
pub struct Consumer<P> {
    config: BrokerConfig,
    processor: Arc<P>,
    /// Bounds concurrently running handlers; also the graceful-drain join point.
    handler_permits: Arc<Semaphore>,
    shutdown: watch::Receiver<bool>,
}

impl<P: MessageProcessor + 'static> Consumer<P> {
    pub fn new(
        config: BrokerConfig,
        processor: Arc<P>,
        handler_permits: Arc<Semaphore>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            processor,
            handler_permits,
            shutdown,
        }
    }

    /// Run until shutdown. Never returns early on broker failures; those log
    /// and retry forever.
    pub async fn run(mut self) {
        info!("starting broker consumer");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            match self.consume_until_disconnect().await {
                Ok(ConsumeExit::Shutdown) => break,
                Ok(ConsumeExit::ConnectionLost) => {
                    warn!("broker connection lost, reconnecting");
                }
                Err(e) => {
                    warn!(error = %e, "broker consume cycle failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.retry_interval) => {}
                _ = self.shutdown.changed() => {}
            }
        }

        info!("broker consumer stopped");
    }

    async fn consume_until_disconnect(&self) -> QueueResult<ConsumeExit> {
        let mut shutdown = self.shutdown.clone();
        let connection =
            Connection::connect(&self.config.amqp_url(), ConnectionProperties::default()).await?;
        info!("broker connection established");

        let channel = connection.create_channel().await?;
        channel
            .basic_qos(self.config.prefetch, BasicQosOptions::default())
            .await?;
        debug!(prefetch = self.config.prefetch, "channel QoS configured");

        let consumer_tag = format!("dispatcher-{}", Uuid::new_v4());
        let mut deliveries = channel
            .basic_consume(
                &self.config.consume_queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;
        info!(queue = %self.config.consume_queue, "consuming segment messages");

        let exit = loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break ConsumeExit::Shutdown;
                    }
                }
                delivery = deliveries.next() => match delivery {
                    Some(Ok(delivery)) => self.dispatch(delivery).await,
                    Some(Err(e)) => {
                        warn!(error = %e, "delivery stream error");
                        break ConsumeExit::ConnectionLost;
                    }
                    None => {
                        warn!("delivery stream closed");
                        break ConsumeExit::ConnectionLost;
                    }
                },
            }
        };

        if channel.status().connected() {
            channel.close(200, "shutting down").await.ok();
        }
        if connection.status().connected() {
            connection.close(200, "shutting down").await.ok();
        }

        Ok(exit)
    }

    /// Hand one delivery to its own handler task.
    async fn dispatch(&self, delivery: Delivery) {
        let permit = match Arc::clone(&self.handler_permits).acquire_owned().await {
            Ok(permit) => permit,
            // Semaphore closed means the process is going down.
            Err(_) => return,
        };
        let processor = Arc::clone(&self.processor);

        tokio::spawn(async move {
            let _permit = permit;
            let tag = delivery.delivery_tag;

            match processor.process(&delivery.data).await {
                Ok(()) => {
                    debug!(tag, "message processed");
                    if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                        error!(tag, error = %e, "ack failed");
                    }
                }
                Err(e) => {
                    warn!(tag, error = %e, "message processing failed, requeuing");
                    let options = BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    };
                    if let Err(e) = delivery.nack(options).await {
                        error!(tag, error = %e, "nack failed");
                    }
                }
            }
        });
    }
}

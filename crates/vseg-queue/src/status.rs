//! Status-event publishing.

use async_trait::async_trait;
use lapin::options::BasicPublishOptions;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex;
use tracing::info;

use vseg_models::{StatusEvent, VideoStatus};

use crate::config::BrokerConfig;
use crate::error::QueueResult;

/// Exchange all status events go to.
pub const STATUS_EXCHANGE: &str = "video";
/// Routing key for status events.
pub const STATUS_ROUTING_KEY: &str = "video.status";

const PERSISTENT_DELIVERY: u8 = 2;

/// Publishes lifecycle status events for a video.
///
/// Publication is best-effort from the dispatch path's point of view: callers
/// log failures and move on rather than failing the message.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(
        &self,
        video_id: &str,
        status: VideoStatus,
        metadata: serde_json::Value,
        error: Option<String>,
    ) -> QueueResult<()>;
}

/// AMQP-backed status publisher.
///
/// The connection is established lazily on first publish and re-established
/// whenever the broker drops it. The mutex both guards the lazy state and
/// serializes concurrent publishes onto the single channel.
pub struct AmqpStatusPublisher {
    config: BrokerConfig,
    state: Mutex<Option<(Connection, Channel)>>,
}

impl AmqpStatusPublisher {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
        }
    }

    async fn ensure_channel(
        &self,
        state: &mut Option<(Connection, Channel)>,
    ) -> QueueResult<Channel> {
        if let Some((connection, channel)) = state {
            if connection.status().connected() && channel.status().connected() {
                return Ok(channel.clone());
            }
        }

        let connection =
            Connection::connect(&self.config.amqp_url(), ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        let handle = channel.clone();
        *state = Some((connection, channel));
        Ok(handle)
    }

    /// Close the connection if one was ever established.
    pub async fn close(&self) {
        if let Some((connection, channel)) = self.state.lock().await.take() {
            channel.close(200, "shutting down").await.ok();
            connection.close(200, "shutting down").await.ok();
        }
    }
}

#[async_trait]
impl StatusPublisher for AmqpStatusPublisher {
    async fn publish(
        &self,
        video_id: &str,
        status: VideoStatus,
        metadata: serde_json::Value,
        error: Option<String>,
    ) -> QueueResult<()> {
        let event = StatusEvent::new(video_id, status, metadata, error);
        let body = serde_json::to_vec(&event)?;

        let mut state = self.state.lock().await;
        let channel = self.ensure_channel(&mut state).await?;
        channel
            .basic_publish(
                STATUS_EXCHANGE,
                STATUS_ROUTING_KEY,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(PERSISTENT_DELIVERY),
            )
            .await?
            .await?;

        info!(video_id, status = %status, "published status event");
        Ok(())
    }
}

//! Redis client for seeding per-video progress state.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::keys::{completed_jobs_key, master_playlist_key, total_jobs_key};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("REDIS_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(6379),
            password: std::env::var("REDIS_PASSWORD").unwrap_or_default(),
            db: std::env::var("REDIS_DB")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }

    /// Connection URL for the redis client.
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

/// Seeding operations the dispatch path depends on.
///
/// Both operations are set-if-absent and safe to repeat on broker redelivery;
/// the store is the authority on what has already been initialized.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Seed the per-resolution bitrate map for a video. Existing fields are
    /// left untouched; the first individual failure aborts the seeding.
    async fn seed_bitrate_map(
        &self,
        video_id: &str,
        bitrates: &HashMap<String, i64>,
    ) -> StateResult<()>;

    /// Seed the total-segment counter and the per-resolution completed
    /// counter in a single pipelined round-trip. "Key existed" is success.
    async fn seed_counters(
        &self,
        video_id: &str,
        resolution: &str,
        total_segments: i64,
    ) -> StateResult<()>;

    async fn health_check(&self) -> StateResult<()>;
}

/// Redis-backed implementation of [`ProgressStore`].
pub struct RedisProgressStore {
    client: redis::Client,
}

impl RedisProgressStore {
    /// Connect and verify the store responds to PING.
    pub async fn connect(config: &StoreConfig) -> StateResult<Self> {
        let client = redis::Client::open(config.url())?;

        let mut conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| StateError::connection_failed("timed out connecting to Redis"))??;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;

        info!(host = %config.host, port = config.port, "connected to Redis");
        Ok(Self { client })
    }
}

#[async_trait]
impl ProgressStore for RedisProgressStore {
    async fn seed_bitrate_map(
        &self,
        video_id: &str,
        bitrates: &HashMap<String, i64>,
    ) -> StateResult<()> {
        let key = master_playlist_key(video_id);
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        for (resolution, bitrate) in bitrates {
            let created: bool = conn.hset_nx(&key, resolution, *bitrate).await?;
            if created {
                debug!(%key, %resolution, bitrate, "seeded master playlist field");
            } else {
                debug!(%key, %resolution, "master playlist field exists, skipped");
            }
        }

        Ok(())
    }

    async fn seed_counters(
        &self,
        video_id: &str,
        resolution: &str,
        total_segments: i64,
    ) -> StateResult<()> {
        let total_key = total_jobs_key(video_id);
        let completed_key = completed_jobs_key(video_id);
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (total_created, completed_created): (bool, bool) = redis::pipe()
            .cmd("SETNX")
            .arg(&total_key)
            .arg(total_segments)
            .cmd("HSETNX")
            .arg(&completed_key)
            .arg(resolution)
            .arg(0)
            .query_async(&mut conn)
            .await?;

        if total_created {
            info!(key = %total_key, total_segments, "initialized total segment counter");
        } else {
            debug!(key = %total_key, "total segment counter already set");
        }
        if completed_created {
            info!(key = %completed_key, %resolution, "initialized completed counter");
        } else {
            debug!(key = %completed_key, %resolution, "completed counter already set");
        }

        Ok(())
    }

    async fn health_check(&self) -> StateResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_url_without_password() {
        let config = StoreConfig::default();
        assert_eq!(config.url(), "redis://localhost:6379/0");
    }

    #[test]
    fn builds_url_with_password_and_db() {
        let config = StoreConfig {
            host: "redis.internal".to_string(),
            port: 6380,
            password: "hunter2".to_string(),
            db: 3,
        };
        assert_eq!(config.url(), "redis://:hunter2@redis.internal:6380/3");
    }
}

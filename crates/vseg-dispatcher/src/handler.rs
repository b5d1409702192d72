//! Per-message orchestration.
//!
//! One inbound segment message fans out into one job per configured
//! resolution. Unrecoverable messages (unparseable or semantically invalid)
//! are dropped with a log so the consumer acks them; transient failures
//! surface as errors so the consumer requeues.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use vseg_k8s::JobSubmitter;
use vseg_models::{JobSpec, JobSpecValidator, MessageValidator, SegmentMessage, VideoStatus};
use vseg_queue::{MessageProcessor, StatusPublisher};
use vseg_state::{completed_jobs_key, master_playlist_key, total_jobs_key, ProgressStore};

use crate::config::Config;
use crate::error::{DispatchError, DispatchResult};

pub struct MessageHandler {
    config: Arc<Config>,
    submitter: Arc<dyn JobSubmitter>,
    store: Arc<dyn ProgressStore>,
    publisher: Arc<dyn StatusPublisher>,
    /// (video, resolution) pairs this process has already seeded. Advisory
    /// cache only; the store's set-if-absent writes are the source of truth,
    /// so losing this on restart is harmless.
    seeded: Mutex<HashSet<String>>,
    message_validator: MessageValidator,
    job_spec_validator: JobSpecValidator,
}

impl MessageHandler {
    pub fn new(
        config: Arc<Config>,
        submitter: Arc<dyn JobSubmitter>,
        store: Arc<dyn ProgressStore>,
        publisher: Arc<dyn StatusPublisher>,
    ) -> Self {
        Self {
            config,
            submitter,
            store,
            publisher,
            seeded: Mutex::new(HashSet::new()),
            message_validator: MessageValidator::new(),
            job_spec_validator: JobSpecValidator::new(),
        }
    }

    /// Process one delivery worth of message bytes.
    pub async fn handle(&self, body: &[u8]) -> DispatchResult<()> {
        let message: SegmentMessage = match serde_json::from_slice(body) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "message parsing failed, dropping");
                return Ok(());
            }
        };

        let problems = self.message_validator.validate(&message);
        if !problems.is_empty() {
            warn!(
                video_id = %message.video_id,
                segment = message.message_id,
                "invalid segment message, dropping"
            );
            for problem in &problems {
                warn!(error = %problem, "validation failure");
            }
            return Ok(());
        }

        info!(
            video_id = %message.video_id,
            segment = message.message_id,
            "processing segment"
        );

        if message.is_first_segment() {
            let metadata = json!({
                "video_url": message.video_url,
                "total_messages": message.total_messages,
            });
            if let Err(e) = self
                .publisher
                .publish(&message.video_id, VideoStatus::Transcoding, metadata, None)
                .await
            {
                warn!(
                    video_id = %message.video_id,
                    error = %e,
                    "failed to publish transcoding status"
                );
            }
        }

        let timestamp_data = message.timestamp_data();
        if timestamp_data.is_empty() {
            // Unreachable after validation; a job must never run without cut points.
            warn!(
                video_id = %message.video_id,
                segment = message.message_id,
                "no timestamps, skipping"
            );
            return Ok(());
        }

        if let Err(err) = self.dispatch_all(&message, &timestamp_data).await {
            let metadata = json!({
                "video_url": message.video_url,
                "message_id": message.message_id,
            });
            if let Err(publish_err) = self
                .publisher
                .publish(
                    &message.video_id,
                    VideoStatus::Failed,
                    metadata,
                    Some(err.to_string()),
                )
                .await
            {
                warn!(
                    video_id = %message.video_id,
                    error = %publish_err,
                    "failed to publish failed status"
                );
            }
            return Err(err);
        }

        info!(
            video_id = %message.video_id,
            segment = message.message_id,
            "segment dispatch complete"
        );
        Ok(())
    }

    /// One concurrent task per configured resolution; every failure is
    /// logged, the first one is surfaced.
    async fn dispatch_all(
        &self,
        message: &SegmentMessage,
        timestamp_data: &str,
    ) -> DispatchResult<()> {
        let resolutions = &self.config.transcode.resolutions;
        let results = join_all(
            resolutions
                .iter()
                .map(|resolution| self.dispatch_resolution(message, timestamp_data, resolution)),
        )
        .await;

        let mut first_error = None;
        for (resolution, result) in resolutions.iter().zip(results) {
            if let Err(e) = result {
                error!(%resolution, error = %e, "transcode job dispatch failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn dispatch_resolution(
        &self,
        message: &SegmentMessage,
        timestamp_data: &str,
        resolution: &str,
    ) -> DispatchResult<()> {
        self.ensure_seeded(message, resolution).await?;

        let Some(&crf) = self.config.transcode.crf_map.get(resolution) else {
            warn!(%resolution, "CRF value not found, skipping job");
            return Err(DispatchError::MissingCrf(resolution.to_string()));
        };

        let spec = self.build_job_spec(message, timestamp_data, resolution, crf);
        if let Some(problem) = self.job_spec_validator.validate(&spec).into_iter().next() {
            return Err(DispatchError::InvalidJobSpec(problem));
        }

        self.submitter
            .submit_job(&spec)
            .await
            .map_err(|source| DispatchError::Submission {
                resolution: resolution.to_string(),
                source,
            })?;

        info!(
            video_id = %message.video_id,
            segment = message.message_id,
            %resolution,
            "transcode job submitted"
        );
        Ok(())
    }

    /// Seed the per-video progress state once per (video, resolution). The
    /// guard is marked only after both seeds succeed, so a failed seed is
    /// retried on redelivery; store calls happen outside the lock.
    async fn ensure_seeded(
        &self,
        message: &SegmentMessage,
        resolution: &str,
    ) -> DispatchResult<()> {
        let guard_key = format!("{}-{}", message.video_id, resolution);
        {
            let seeded = self.seeded.lock().await;
            if seeded.contains(&guard_key) {
                return Ok(());
            }
        }

        let seed = |source| DispatchError::Seed {
            video_id: message.video_id.clone(),
            resolution: resolution.to_string(),
            source,
        };
        self.store
            .seed_bitrate_map(&message.video_id, &self.config.transcode.master_playlist)
            .await
            .map_err(seed)?;
        self.store
            .seed_counters(&message.video_id, resolution, message.total_messages)
            .await
            .map_err(seed)?;

        self.seeded.lock().await.insert(guard_key);
        info!(video_id = %message.video_id, %resolution, "progress state seeded");
        Ok(())
    }

    fn build_job_spec(
        &self,
        message: &SegmentMessage,
        timestamp_data: &str,
        resolution: &str,
        crf: i32,
    ) -> JobSpec {
        let config = &self.config;
        JobSpec {
            segment_id: message.message_id,
            resolution: resolution.to_string(),
            video_id: message.video_id.clone(),
            video_url: message.video_url.clone(),
            timestamp_data: timestamp_data.to_string(),
            crf,
            preset: config.transcode.preset.clone(),
            image: config.transcode.image.clone(),
            namespace: config.kubernetes.namespace.clone(),
            output_bucket: config.object_store.output_bucket.clone(),
            minio_secret_name: config.kubernetes.minio_secret_name.clone(),
            rabbitmq_admin_secret_name: config.kubernetes.rabbitmq_admin_secret_name.clone(),
            redis_host: config.store.host.clone(),
            redis_port: config.store.port,
            redis_password: config.store.password.clone(),
            redis_db: config.store.db,
            total_jobs_key: total_jobs_key(&message.video_id),
            completed_jobs_key: completed_jobs_key(&message.video_id),
            master_playlist_meta_key: master_playlist_key(&message.video_id),
            mc_config_init_image: config.kubernetes.mc_config_init_image.clone(),
            minio_alias: config.object_store.alias.clone(),
            rabbitmq_exchange: config.broker.exchange.clone(),
            rabbitmq_routing_key: config.broker.routing_key.clone(),
            allow_http: config.kubernetes.allow_http_job_arg,
        }
    }
}

#[async_trait]
impl MessageProcessor for MessageHandler {
    async fn process(&self, body: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.handle(body).await.map_err(Into::into)
    }
}

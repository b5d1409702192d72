//! Per-resolution transcode job spec.

/// Everything a single batch job needs, synthesized per (message, resolution).
///
/// Carries the segment identity, encoder settings, and the coordinates of the
/// collaborators the transcoder image talks back to (object store, progress
/// store, bus).
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub segment_id: i64,
    pub resolution: String,
    pub video_id: String,
    pub video_url: String,
    /// Newline-joined timestamp data, mounted into the job as a file.
    pub timestamp_data: String,
    pub crf: i32,
    pub preset: String,
    /// Transcoder container image.
    pub image: String,
    pub namespace: String,
    pub output_bucket: String,
    pub minio_secret_name: String,
    pub rabbitmq_admin_secret_name: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: String,
    pub redis_db: i64,
    pub total_jobs_key: String,
    pub completed_jobs_key: String,
    pub master_playlist_meta_key: String,
    /// Image for the init container that stages the object-store config.
    pub mc_config_init_image: String,
    pub minio_alias: String,
    /// Exchange the worker publishes downstream notifications to.
    pub rabbitmq_exchange: String,
    pub rabbitmq_routing_key: String,
    /// When set, the job is allowed to fetch plain-http sources.
    pub allow_http: bool,
}

//! Message and job-spec validation.
//!
//! Validators are pure: they return the full, ordered list of problems so
//! operators can see every offending field at once.

use thiserror::Error;

use crate::job::JobSpec;
use crate::label::{sanitize_label, DEFAULT_LABEL};
use crate::message::SegmentMessage;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed for {field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validates inbound segment messages against the wire contract.
#[derive(Debug, Clone)]
pub struct MessageValidator {
    max_video_id_len: usize,
    max_video_url_len: usize,
    max_timestamps: usize,
    max_video_duration: f64,
}

impl Default for MessageValidator {
    fn default() -> Self {
        Self {
            max_video_id_len: 100,
            max_video_url_len: 500,
            max_timestamps: 1000,
            max_video_duration: 86_400.0,
        }
    }
}

impl MessageValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self, message: &SegmentMessage) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.check_video_id(&message.video_id, &mut errors);
        self.check_video_url(&message.video_url, &mut errors);
        self.check_message_id(message.message_id, &mut errors);
        self.check_timestamps(&message.timestamps, &mut errors);
        self.check_total_messages(message.total_messages, &mut errors);
        self.check_video_duration(message.total_video_duration, &mut errors);
        errors
    }

    pub fn is_valid(&self, message: &SegmentMessage) -> bool {
        self.validate(message).is_empty()
    }

    fn check_video_id(&self, video_id: &str, errors: &mut Vec<ValidationError>) {
        if video_id.is_empty() {
            errors.push(ValidationError::new("video_id", "video ID cannot be empty"));
            return;
        }

        if video_id.len() > self.max_video_id_len {
            errors.push(ValidationError::new(
                "video_id",
                format!(
                    "video ID exceeds maximum length of {} characters",
                    self.max_video_id_len
                ),
            ));
        }

        let sanitized = sanitize_label(video_id);
        if sanitized == DEFAULT_LABEL {
            errors.push(ValidationError::new(
                "video_id",
                "video ID contains only invalid characters",
            ));
        }
        if sanitized.len() > 63 {
            errors.push(ValidationError::new(
                "video_id",
                "video ID would exceed the orchestrator name limit after sanitization",
            ));
        }
    }

    fn check_video_url(&self, video_url: &str, errors: &mut Vec<ValidationError>) {
        if video_url.is_empty() {
            errors.push(ValidationError::new(
                "video_url",
                "video URL cannot be empty",
            ));
            return;
        }

        if video_url.len() > self.max_video_url_len {
            errors.push(ValidationError::new(
                "video_url",
                format!(
                    "video URL exceeds maximum length of {} characters",
                    self.max_video_url_len
                ),
            ));
        }

        let has_known_scheme = ["http://", "https://", "ftp://"]
            .iter()
            .any(|scheme| video_url.starts_with(scheme));
        if !has_known_scheme {
            errors.push(ValidationError::new(
                "video_url",
                "video URL format is invalid",
            ));
        }
    }

    fn check_message_id(&self, message_id: i64, errors: &mut Vec<ValidationError>) {
        if message_id <= 0 {
            errors.push(ValidationError::new(
                "message_id",
                "message ID must be positive",
            ));
        }
    }

    fn check_timestamps(&self, timestamps: &[f64], errors: &mut Vec<ValidationError>) {
        if timestamps.is_empty() {
            errors.push(ValidationError::new(
                "timestamps",
                "timestamps array cannot be empty",
            ));
            return;
        }

        if timestamps.len() > self.max_timestamps {
            errors.push(ValidationError::new(
                "timestamps",
                format!(
                    "too many timestamps, maximum allowed: {}",
                    self.max_timestamps
                ),
            ));
        }

        for (i, &timestamp) in timestamps.iter().enumerate() {
            if timestamp < 0.0 {
                errors.push(ValidationError::new(
                    "timestamps",
                    format!("timestamp at index {i} cannot be negative"),
                ));
            }
            if i > 0 && timestamp <= timestamps[i - 1] {
                errors.push(ValidationError::new(
                    "timestamps",
                    format!("timestamps must be in ascending order at index {i}"),
                ));
            }
        }
    }

    fn check_total_messages(&self, total_messages: i64, errors: &mut Vec<ValidationError>) {
        if total_messages <= 0 {
            errors.push(ValidationError::new(
                "total_messages",
                "total messages must be positive",
            ));
        }
    }

    fn check_video_duration(&self, duration: f64, errors: &mut Vec<ValidationError>) {
        if duration <= 0.0 {
            errors.push(ValidationError::new(
                "total_video_duration",
                "video duration must be positive",
            ));
        }
        if duration > self.max_video_duration {
            errors.push(ValidationError::new(
                "total_video_duration",
                "video duration exceeds maximum allowed (24 hours)",
            ));
        }
    }
}

/// Encoder speed/compression presets the downstream transcoder understands.
pub const SUPPORTED_PRESETS: [&str; 9] = [
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];

/// Defensive validation of a synthesized job spec before submission.
#[derive(Debug, Clone)]
pub struct JobSpecValidator {
    max_namespace_len: usize,
}

impl Default for JobSpecValidator {
    fn default() -> Self {
        Self {
            max_namespace_len: 63,
        }
    }
}

impl JobSpecValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self, spec: &JobSpec) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if spec.segment_id <= 0 {
            errors.push(ValidationError::new(
                "segment_id",
                "segment ID must be positive",
            ));
        }
        if spec.resolution.is_empty() {
            errors.push(ValidationError::new(
                "resolution",
                "resolution cannot be empty",
            ));
        }
        if spec.video_id.is_empty() {
            errors.push(ValidationError::new("video_id", "video ID cannot be empty"));
        }
        if spec.video_url.is_empty() {
            errors.push(ValidationError::new(
                "video_url",
                "video URL cannot be empty",
            ));
        }
        if spec.timestamp_data.is_empty() {
            errors.push(ValidationError::new(
                "timestamp_data",
                "timestamp data cannot be empty",
            ));
        }

        if spec.crf < 1 || spec.crf > 51 {
            errors.push(ValidationError::new("crf", "CRF must be between 1 and 51"));
        }
        if !SUPPORTED_PRESETS.contains(&spec.preset.as_str()) {
            errors.push(ValidationError::new(
                "preset",
                format!("preset must be one of: {}", SUPPORTED_PRESETS.join(", ")),
            ));
        }
        if spec.image.is_empty() {
            errors.push(ValidationError::new(
                "image",
                "container image cannot be empty",
            ));
        }

        if spec.namespace.is_empty() {
            errors.push(ValidationError::new(
                "namespace",
                "namespace cannot be empty",
            ));
        } else if spec.namespace.len() > self.max_namespace_len {
            errors.push(ValidationError::new(
                "namespace",
                format!(
                    "namespace exceeds maximum length of {}",
                    self.max_namespace_len
                ),
            ));
        }
        if spec.output_bucket.is_empty() {
            errors.push(ValidationError::new(
                "output_bucket",
                "output bucket cannot be empty",
            ));
        }
        if spec.redis_host.is_empty() {
            errors.push(ValidationError::new(
                "redis_host",
                "Redis host cannot be empty",
            ));
        }
        if spec.redis_port == 0 {
            errors.push(ValidationError::new(
                "redis_port",
                "Redis port must be between 1 and 65535",
            ));
        }

        errors
    }

    pub fn is_valid(&self, spec: &JobSpec) -> bool {
        self.validate(spec).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_message() -> SegmentMessage {
        SegmentMessage {
            message_id: 1,
            video_url: "https://example.com/v.mp4".to_string(),
            video_id: "vid-A".to_string(),
            timestamps: vec![0.0, 10.5],
            total_video_duration: 60.0,
            total_messages: 2,
        }
    }

    fn valid_spec() -> JobSpec {
        JobSpec {
            segment_id: 1,
            resolution: "360".to_string(),
            video_id: "vid-A".to_string(),
            video_url: "https://example.com/v.mp4".to_string(),
            timestamp_data: "0.000000\n10.500000".to_string(),
            crf: 34,
            preset: "ultrafast".to_string(),
            image: "transcode:latest".to_string(),
            namespace: "default".to_string(),
            output_bucket: "transcoded-videos".to_string(),
            minio_secret_name: "minio-secret".to_string(),
            rabbitmq_admin_secret_name: "rabbitmq-admin-secret".to_string(),
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_password: String::new(),
            redis_db: 0,
            total_jobs_key: "transcode:jobs:vid-A:total".to_string(),
            completed_jobs_key: "transcode:jobs:vid-A:completed".to_string(),
            master_playlist_meta_key: "transcode:playlists:vid-A:meta".to_string(),
            mc_config_init_image: "alpine:latest".to_string(),
            minio_alias: "transcoder".to_string(),
            rabbitmq_exchange: "video".to_string(),
            rabbitmq_routing_key: "video.playlist".to_string(),
            allow_http: true,
        }
    }

    fn fields(errors: &[ValidationError]) -> Vec<&'static str> {
        errors.iter().map(|e| e.field).collect()
    }

    #[test]
    fn accepts_valid_message() {
        let validator = MessageValidator::new();
        assert!(validator.is_valid(&valid_message()));
    }

    #[test]
    fn rejects_empty_video_id() {
        let mut message = valid_message();
        message.video_id = String::new();
        let errors = MessageValidator::new().validate(&message);
        assert_eq!(fields(&errors), vec!["video_id"]);
    }

    #[test]
    fn rejects_video_id_that_sanitizes_to_nothing() {
        let mut message = valid_message();
        message.video_id = "!!!".to_string();
        let errors = MessageValidator::new().validate(&message);
        assert!(errors
            .iter()
            .any(|e| e.field == "video_id" && e.message.contains("invalid characters")));
    }

    #[test]
    fn rejects_overlong_video_id() {
        let mut message = valid_message();
        message.video_id = "a".repeat(101);
        let errors = MessageValidator::new().validate(&message);
        assert!(errors.iter().any(|e| e.field == "video_id"
            && e.message.contains("maximum length of 100")));
    }

    #[test]
    fn rejects_unknown_url_scheme() {
        let mut message = valid_message();
        message.video_url = "gopher://example.com/v.mp4".to_string();
        let errors = MessageValidator::new().validate(&message);
        assert_eq!(fields(&errors), vec!["video_url"]);
    }

    #[test]
    fn accepts_ftp_scheme() {
        let mut message = valid_message();
        message.video_url = "ftp://example.com/v.mp4".to_string();
        assert!(MessageValidator::new().is_valid(&message));
    }

    #[test]
    fn rejects_non_positive_message_id() {
        let mut message = valid_message();
        message.message_id = 0;
        let errors = MessageValidator::new().validate(&message);
        assert_eq!(fields(&errors), vec!["message_id"]);
    }

    #[test]
    fn rejects_empty_timestamps() {
        let mut message = valid_message();
        message.timestamps = Vec::new();
        let errors = MessageValidator::new().validate(&message);
        assert_eq!(fields(&errors), vec!["timestamps"]);
    }

    #[test]
    fn rejects_negative_timestamp_with_index() {
        let mut message = valid_message();
        message.timestamps = vec![0.0, -1.0, 2.0];
        let errors = MessageValidator::new().validate(&message);
        assert!(errors
            .iter()
            .any(|e| e.message == "timestamp at index 1 cannot be negative"));
    }

    #[test]
    fn rejects_non_ascending_timestamps_with_index() {
        let mut message = valid_message();
        message.timestamps = vec![0.0, 5.0, 5.0];
        let errors = MessageValidator::new().validate(&message);
        assert!(errors
            .iter()
            .any(|e| e.message == "timestamps must be in ascending order at index 2"));
    }

    #[test]
    fn rejects_too_many_timestamps() {
        let mut message = valid_message();
        message.timestamps = (0..1001).map(|i| i as f64).collect();
        let errors = MessageValidator::new().validate(&message);
        assert!(errors
            .iter()
            .any(|e| e.field == "timestamps" && e.message.contains("maximum allowed: 1000")));
    }

    #[test]
    fn rejects_bad_duration_and_totals() {
        let mut message = valid_message();
        message.total_video_duration = 0.0;
        message.total_messages = 0;
        let errors = MessageValidator::new().validate(&message);
        assert_eq!(fields(&errors), vec!["total_messages", "total_video_duration"]);
    }

    #[test]
    fn rejects_duration_beyond_24_hours() {
        let mut message = valid_message();
        message.total_video_duration = 86_401.0;
        let errors = MessageValidator::new().validate(&message);
        assert!(errors
            .iter()
            .any(|e| e.message.contains("24 hours")));
    }

    #[test]
    fn collects_all_problems_of_a_degenerate_message() {
        let message = SegmentMessage {
            message_id: 1,
            video_url: "ftp://x".to_string(),
            video_id: String::new(),
            timestamps: vec![0.0],
            total_video_duration: 0.0,
            total_messages: 0,
        };
        let errors = MessageValidator::new().validate(&message);
        assert_eq!(
            fields(&errors),
            vec!["video_id", "total_messages", "total_video_duration"]
        );
    }

    #[test]
    fn accepts_valid_job_spec() {
        assert!(JobSpecValidator::new().is_valid(&valid_spec()));
    }

    #[test]
    fn rejects_crf_out_of_range() {
        let validator = JobSpecValidator::new();
        for crf in [0, 52, -1] {
            let mut spec = valid_spec();
            spec.crf = crf;
            let errors = validator.validate(&spec);
            assert_eq!(fields(&errors), vec!["crf"], "crf={crf}");
        }
        let mut spec = valid_spec();
        spec.crf = 51;
        assert!(validator.is_valid(&spec));
    }

    #[test]
    fn rejects_unknown_preset() {
        let mut spec = valid_spec();
        spec.preset = "warpspeed".to_string();
        let errors = JobSpecValidator::new().validate(&spec);
        assert_eq!(fields(&errors), vec!["preset"]);
    }

    #[test]
    fn rejects_zero_redis_port() {
        let mut spec = valid_spec();
        spec.redis_port = 0;
        let errors = JobSpecValidator::new().validate(&spec);
        assert_eq!(fields(&errors), vec!["redis_port"]);
    }

    #[test]
    fn rejects_bad_namespace() {
        let validator = JobSpecValidator::new();

        let mut spec = valid_spec();
        spec.namespace = String::new();
        assert_eq!(fields(&validator.validate(&spec)), vec!["namespace"]);

        spec.namespace = "n".repeat(64);
        assert_eq!(fields(&validator.validate(&spec)), vec!["namespace"]);
    }

    #[test]
    fn rejects_empty_timestamp_data() {
        let mut spec = valid_spec();
        spec.timestamp_data = String::new();
        let errors = JobSpecValidator::new().validate(&spec);
        assert_eq!(fields(&errors), vec!["timestamp_data"]);
    }
}

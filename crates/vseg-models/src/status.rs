//! Lifecycle status events published on the bus.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Service name stamped on every status event.
pub const SERVICE_NAME: &str = "transcoder";

/// Video lifecycle states this service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Transcoding,
    Failed,
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoStatus::Transcoding => write!(f, "transcoding"),
            VideoStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Wire format of a status event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub video_id: String,
    pub status: VideoStatus,
    pub service: String,
    /// ISO-8601 UTC, second precision.
    pub timestamp: String,
    pub metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusEvent {
    pub fn new(
        video_id: impl Into<String>,
        status: VideoStatus,
        metadata: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            status,
            service: SERVICE_NAME.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            metadata,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_wire_shape() {
        let event = StatusEvent::new(
            "vid-A",
            VideoStatus::Transcoding,
            json!({"total_messages": 2}),
            None,
        );
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["video_id"], "vid-A");
        assert_eq!(value["status"], "transcoding");
        assert_eq!(value["service"], "transcoder");
        assert_eq!(value["metadata"]["total_messages"], 2);
        // error is omitted, not null
        assert!(value.get("error").is_none());
        // RFC 3339 with a trailing Z
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn carries_error_for_failed_status() {
        let event = StatusEvent::new(
            "vid-A",
            VideoStatus::Failed,
            json!({}),
            Some("boom".to_string()),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "boom");
    }
}

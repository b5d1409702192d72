//! Inbound segment message.

use serde::{Deserialize, Serialize};

/// One segment of a source video, as delivered on the segment queue.
///
/// Fields default to their zero values when absent so that structurally
/// incomplete messages still parse and are rejected by validation instead of
/// being indistinguishable from malformed JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentMessage {
    /// 1-based ordinal of this segment within the video.
    pub message_id: i64,
    /// Absolute URL of the source video.
    pub video_url: String,
    /// Identifier of the video this segment belongs to.
    pub video_id: String,
    /// Cut points within the source, seconds, strictly ascending.
    pub timestamps: Vec<f64>,
    /// Duration of the whole video, seconds.
    pub total_video_duration: f64,
    /// Total number of segments the video was split into.
    pub total_messages: i64,
}

impl Default for SegmentMessage {
    fn default() -> Self {
        Self {
            message_id: 0,
            video_url: String::new(),
            video_id: String::new(),
            timestamps: Vec::new(),
            total_video_duration: 0.0,
            total_messages: 0,
        }
    }
}

impl SegmentMessage {
    /// The first segment of a video triggers the "transcoding" status event.
    pub fn is_first_segment(&self) -> bool {
        self.message_id == 1
    }

    /// Newline-joined timestamp data with fixed 6-decimal formatting, as the
    /// transcoder image expects to find in its mounted timestamp file.
    pub fn timestamp_data(&self) -> String {
        self.timestamps
            .iter()
            .map(|t| format!("{t:.6}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_data_uses_fixed_six_decimals() {
        let message = SegmentMessage {
            timestamps: vec![0.0, 10.5],
            ..Default::default()
        };
        assert_eq!(message.timestamp_data(), "0.000000\n10.500000");
    }

    #[test]
    fn timestamp_data_is_empty_for_no_timestamps() {
        assert_eq!(SegmentMessage::default().timestamp_data(), "");
    }

    #[test]
    fn first_segment_is_message_id_one() {
        let mut message = SegmentMessage {
            message_id: 1,
            ..Default::default()
        };
        assert!(message.is_first_segment());
        message.message_id = 2;
        assert!(!message.is_first_segment());
    }

    #[test]
    fn missing_fields_parse_as_zero_values() {
        let message: SegmentMessage = serde_json::from_str(r#"{"video_id":"v"}"#).unwrap();
        assert_eq!(message.video_id, "v");
        assert_eq!(message.message_id, 0);
        assert!(message.timestamps.is_empty());
    }

    #[test]
    fn round_trips_through_wire_json() {
        let raw = r#"{
            "message_id": 1,
            "video_url": "https://example.com/v.mp4",
            "video_id": "vid-A",
            "timestamps": [0.0, 10.5],
            "total_video_duration": 60.0,
            "total_messages": 2
        }"#;
        let message: SegmentMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(message.message_id, 1);
        assert_eq!(message.video_id, "vid-A");
        assert_eq!(message.total_messages, 2);
        assert_eq!(message.timestamps, vec![0.0, 10.5]);
    }
}

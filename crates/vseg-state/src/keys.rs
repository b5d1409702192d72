//! Canonical keys of the per-video progress namespace.
//!
//! These strings are part of the interface with the transcoder jobs, which
//! receive them verbatim through their environment.

/// Counter holding the total expected segment count for a video.
pub fn total_jobs_key(video_id: &str) -> String {
    format!("transcode:jobs:{video_id}:total")
}

/// Hash of per-resolution completed-segment counters.
pub fn completed_jobs_key(video_id: &str) -> String {
    format!("transcode:jobs:{video_id}:completed")
}

/// Hash of per-resolution bitrates for the master playlist.
pub fn master_playlist_key(video_id: &str) -> String {
    format!("transcode:playlists:{video_id}:meta")
}

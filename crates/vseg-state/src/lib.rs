//! Redis-backed progress state for in-flight videos.
//!
//! This crate provides:
//! - Canonical key formatting for the per-video progress namespace
//! - Idempotent seeding of counters and bitrate metadata (set-if-absent)
//! - A trait seam so the dispatch path can be tested without a store

pub mod client;
pub mod error;
pub mod keys;

pub use client::{ProgressStore, RedisProgressStore, StoreConfig};
pub use error::{StateError, StateResult};
pub use keys::{completed_jobs_key, master_playlist_key, total_jobs_key};

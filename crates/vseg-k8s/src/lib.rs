//! Kubernetes job submission for transcode segments.
//!
//! This crate provides:
//! - Deterministic naming for per-segment resources
//! - Config-map and batch-job descriptor builders
//! - Idempotent submission (replays of the same segment are success)

pub mod client;
pub mod error;
pub mod jobs;
pub mod submitter;

pub use client::KubeClient;
pub use error::{K8sError, K8sResult};
pub use submitter::JobSubmitter;

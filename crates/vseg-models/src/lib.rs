//! Shared types for the segment dispatcher.
//!
//! This crate provides:
//! - The inbound segment message and the synthesized per-resolution job spec
//! - The outbound status event
//! - Label sanitization for orchestrator resource names
//! - Message and job-spec validators

pub mod job;
pub mod label;
pub mod message;
pub mod status;
pub mod validation;

pub use job::JobSpec;
pub use label::{sanitize_label, DEFAULT_LABEL};
pub use message::SegmentMessage;
pub use status::{StatusEvent, VideoStatus};
pub use validation::{JobSpecValidator, MessageValidator, ValidationError};

//! Segment dispatch service.
//!
//! Consumes segment-level transcode requests from the broker, fans each one
//! out into per-resolution batch jobs on the orchestrator, seeds per-video
//! progress state in the shared store, and publishes lifecycle status events.

pub mod config;
pub mod error;
pub mod handler;
pub mod health;
pub mod object_store;

pub use config::Config;
pub use error::{DispatchError, DispatchResult};
pub use handler::MessageHandler;

//! AMQP plumbing for the segment dispatcher.
//!
//! This crate provides:
//! - The connection-resilient segment consumer (prefetch-bounded, ack/nack)
//! - The lazily-connected status publisher
//! - Broker configuration from the environment

pub mod config;
pub mod consumer;
pub mod error;
pub mod status;

pub use config::BrokerConfig;
pub use consumer::{Consumer, MessageProcessor};
pub use error::{QueueError, QueueResult};
pub use status::{AmqpStatusPublisher, StatusPublisher, STATUS_EXCHANGE, STATUS_ROUTING_KEY};

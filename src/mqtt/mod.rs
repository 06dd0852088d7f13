//! # Broker Publication
//!
//! Everything between an [`InterpretedState`](crate::telemetry::InterpretedState)
//! and the MQTT broker:
//!
//! - [`payload`] - state/heartbeat JSON bodies per payload format
//! - [`discovery`] - Home Assistant discovery documents
//! - [`link`] - rumqttc-backed broker connection
//! - [`publisher`] - connection lifecycle, retries, cache write-through
//!
//! ## Failure model
//!
//! The broker is expected to come and go. Nothing in this module retries in a
//! loop or treats an unavailable broker as fatal: a failed connect or publish
//! is logged, counted, and reported to the caller as [`BrokerError`]. The next
//! radio frame or heartbeat is the retry.
//!
//! ## Topics
//!
//! ```text
//! <topic>/state                  state updates and heartbeats
//! <topic>_temperature/config     discovery documents, one per channel
//! <topic>_proximity/config
//! ...
//! ```

pub mod discovery;
pub mod link;
pub mod payload;
pub mod publisher;

use thiserror::Error;

pub use link::{MqttLink, MqttSettings};
pub use payload::Lifecycle;
pub use publisher::Publisher;

/// Broker-side failures. Both are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The connection could not be established (refused, unreachable, timed out).
    #[error("broker connect failed: {0}")]
    Connect(String),
    /// The connection was believed live but the publish was not accepted.
    #[error("broker publish failed: {0}")]
    Publish(String),
}

/// Minimal broker connection contract the [`Publisher`] drives.
///
/// `connect` must make at most one bounded attempt per call; callers own the
/// retry policy.
#[allow(async_fn_in_trait)]
pub trait BrokerLink {
    async fn connect(&mut self) -> Result<(), BrokerError>;

    fn is_connected(&self) -> bool;

    async fn publish(&mut self, topic: &str, payload: &str, retain: bool)
        -> Result<(), BrokerError>;
}

//! Processing queue adapters.
//!
//! Submission goes through `cnjflow_core::QueueService`; consumption is the
//! infra-side `QueueConsumer` contract used by the queue worker. Delivery is
//! at-least-once: a received message that is not acknowledged becomes
//! visible again after the visibility timeout, and is dead-lettered once it
//! has been delivered `max_receive_count` times.

use std::time::Duration;

use async_trait::async_trait;

use cnjflow_core::{Delivery, MessageId, QueueError};

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_streams;

pub use in_memory::InMemoryQueue;
#[cfg(feature = "redis")]
pub use redis_streams::RedisStreamsQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// How long a received message stays hidden before redelivery.
    pub visibility_timeout: Duration,
    /// Deliveries after which an unacknowledged message is dead-lettered.
    pub max_receive_count: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            max_receive_count: 5,
        }
    }
}

#[async_trait]
pub trait QueueConsumer: Send + Sync {
    /// Receive up to `max` messages, waiting up to `wait` for the first one.
    /// An empty batch means nothing arrived in time.
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<Delivery>, QueueError>;

    /// Remove processed messages from the queue. Unknown ids are ignored.
    async fn ack(&self, ids: &[MessageId]) -> Result<(), QueueError>;
}

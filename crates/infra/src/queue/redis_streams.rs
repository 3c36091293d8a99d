//! Redis Streams-backed processing queue (durable, at-least-once delivery).
//!
//! - **Stream key**: `cnjflow:queue` holds one entry per submitted message
//!   (`payload` field = JSON body)
//! - **Consumer group**: workers share one group, so each entry is handed to
//!   one consumer at a time
//! - **Redelivery**: pending entries idle longer than the visibility timeout
//!   are claimed again (`XCLAIM`)
//! - **Dead-letter queue**: `cnjflow:queue:dlq` receives entries delivered
//!   `max_receive_count` times without an `XACK`
//!
//! The `redis` client is synchronous; every call runs on the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::Commands;
use redis::streams::{
    StreamClaimReply, StreamId, StreamPendingCountReply, StreamRangeReply, StreamReadOptions,
    StreamReadReply,
};
use tracing::{instrument, warn};

use cnjflow_core::{CnjMessage, Delivery, MessageId, QueueError, QueueService};

use super::{QueueConfig, QueueConsumer};

const DEFAULT_STREAM_KEY: &str = "cnjflow:queue";
const DEFAULT_DLQ_KEY: &str = "cnjflow:queue:dlq";
const DEFAULT_GROUP: &str = "cnjflow.processors";
const PAYLOAD_FIELD: &str = "payload";

#[derive(Debug, Clone)]
pub struct RedisStreamsQueue {
    client: Arc<redis::Client>,
    stream_key: String,
    dlq_key: String,
    group: String,
    consumer: String,
    config: QueueConfig,
}

impl RedisStreamsQueue {
    /// Connect and make sure the consumer group exists.
    pub fn new(redis_url: &str, consumer: impl Into<String>, config: QueueConfig) -> Result<Self, QueueError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| QueueError::Connection(e.to_string()))?;
        let queue = Self {
            client: Arc::new(client),
            stream_key: DEFAULT_STREAM_KEY.to_string(),
            dlq_key: DEFAULT_DLQ_KEY.to_string(),
            group: DEFAULT_GROUP.to_string(),
            consumer: consumer.into(),
            config,
        };
        queue.ensure_consumer_group()?;
        Ok(queue)
    }

    /// Use a different stream (and derived DLQ key).
    pub fn with_stream_key(mut self, stream_key: impl Into<String>) -> Result<Self, QueueError> {
        self.stream_key = stream_key.into();
        self.dlq_key = format!("{}:dlq", self.stream_key);
        self.ensure_consumer_group()?;
        Ok(self)
    }

    fn connection(&self) -> Result<redis::Connection, QueueError> {
        self.client
            .get_connection()
            .map_err(|e| QueueError::Connection(e.to_string()))
    }

    /// `XGROUP CREATE ... MKSTREAM`; an existing group is not an error.
    fn ensure_consumer_group(&self) -> Result<(), QueueError> {
        let mut conn = self.connection()?;
        let created: redis::RedisResult<()> =
            conn.xgroup_create_mkstream(&self.stream_key, &self.group, "0");
        match created {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(QueueError::Command(format!("XGROUP CREATE failed: {e}"))),
        }
    }

    fn send_sync(&self, body: &str) -> Result<MessageId, QueueError> {
        let mut conn = self.connection()?;
        let id: String = conn
            .xadd(&self.stream_key, "*", &[(PAYLOAD_FIELD, body)])
            .map_err(|e| QueueError::Command(format!("XADD failed: {e}")))?;
        Ok(MessageId::new(id))
    }

    fn receive_sync(&self, max: usize, wait: Duration) -> Result<Vec<Delivery>, QueueError> {
        let mut conn = self.connection()?;

        let reclaimed = self.reclaim_idle(&mut conn, max)?;
        if !reclaimed.is_empty() {
            return Ok(reclaimed);
        }

        // BLOCK 0 would wait forever.
        let block_ms = wait.as_millis().clamp(1, u128::from(u32::MAX)) as usize;
        let options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(max)
            .block(block_ms);
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.stream_key], &[">"], &options)
            .map_err(|e| QueueError::Command(format!("XREADGROUP failed: {e}")))?;

        Ok(reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect::<Vec<_>>())
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| to_delivery(entry, 1))
            .collect())
    }

    /// Claim pending entries whose visibility timeout has passed, moving the
    /// ones that exhausted their deliveries to the DLQ.
    fn reclaim_idle(&self, conn: &mut redis::Connection, max: usize) -> Result<Vec<Delivery>, QueueError> {
        let pending: StreamPendingCountReply = conn
            .xpending_count(&self.stream_key, &self.group, "-", "+", max)
            .map_err(|e| QueueError::Command(format!("XPENDING failed: {e}")))?;

        let visibility_ms = self.config.visibility_timeout.as_millis() as usize;
        let mut claim_ids = Vec::new();
        let mut counts = std::collections::HashMap::new();
        for entry in pending.ids {
            if entry.last_delivered_ms < visibility_ms {
                continue;
            }
            if entry.times_delivered >= self.config.max_receive_count as usize {
                self.dead_letter(conn, &entry.id, entry.times_delivered)?;
            } else {
                counts.insert(entry.id.clone(), entry.times_delivered as u32 + 1);
                claim_ids.push(entry.id);
            }
        }

        if claim_ids.is_empty() {
            return Ok(Vec::new());
        }

        let claimed: StreamClaimReply = conn
            .xclaim(&self.stream_key, &self.group, &self.consumer, visibility_ms, &claim_ids)
            .map_err(|e| QueueError::Command(format!("XCLAIM failed: {e}")))?;

        Ok(claimed
            .ids
            .iter()
            .filter_map(|entry| {
                let count = counts.get(&entry.id).copied().unwrap_or(1);
                to_delivery(entry, count)
            })
            .collect())
    }

    fn dead_letter(
        &self,
        conn: &mut redis::Connection,
        id: &str,
        times_delivered: usize,
    ) -> Result<(), QueueError> {
        let entries: StreamRangeReply = conn
            .xrange_count(&self.stream_key, id, id, 1)
            .map_err(|e| QueueError::Command(format!("XRANGE failed: {e}")))?;
        let payload = entries
            .ids
            .first()
            .and_then(|entry| entry.get::<String>(PAYLOAD_FIELD))
            .unwrap_or_default();

        let _: String = conn
            .xadd(
                &self.dlq_key,
                "*",
                &[
                    ("original_message_id", id.to_string()),
                    ("receive_count", times_delivered.to_string()),
                    ("failed_at", chrono::Utc::now().to_rfc3339()),
                    (PAYLOAD_FIELD, payload),
                ],
            )
            .map_err(|e| QueueError::Command(format!("DLQ XADD failed: {e}")))?;
        let _: u64 = conn
            .xack(&self.stream_key, &self.group, &[id])
            .map_err(|e| QueueError::Command(format!("XACK failed: {e}")))?;

        warn!(message_id = %id, receive_count = times_delivered, "message sent to dead-letter queue");
        Ok(())
    }

    fn ack_sync(&self, ids: &[MessageId]) -> Result<(), QueueError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection()?;
        let ids: Vec<&str> = ids.iter().map(MessageId::as_str).collect();
        let _: u64 = conn
            .xack(&self.stream_key, &self.group, &ids)
            .map_err(|e| QueueError::Command(format!("XACK failed: {e}")))?;
        Ok(())
    }
}

fn to_delivery(entry: &StreamId, receive_count: u32) -> Option<Delivery> {
    let Some(body) = entry.get::<String>(PAYLOAD_FIELD) else {
        warn!(message_id = %entry.id, "stream entry without payload skipped");
        return None;
    };
    Some(Delivery {
        message_id: MessageId::new(entry.id.clone()),
        body,
        receive_count,
    })
}

async fn blocking<T, F>(f: F) -> Result<T, QueueError>
where
    F: FnOnce() -> Result<T, QueueError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| QueueError::Connection(format!("blocking task failed: {e}")))?
}

#[async_trait]
impl QueueService for RedisStreamsQueue {
    #[instrument(skip(self, message), fields(stream_key = %self.stream_key, cnj = %message.cnj), err)]
    async fn send(&self, message: &CnjMessage) -> Result<MessageId, QueueError> {
        let body =
            serde_json::to_string(message).map_err(|e| QueueError::Serialization(e.to_string()))?;
        let queue = self.clone();
        blocking(move || queue.send_sync(&body)).await
    }
}

#[async_trait]
impl QueueConsumer for RedisStreamsQueue {
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<Delivery>, QueueError> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let queue = self.clone();
        blocking(move || queue.receive_sync(max, wait)).await
    }

    async fn ack(&self, ids: &[MessageId]) -> Result<(), QueueError> {
        let queue = self.clone();
        let ids = ids.to_vec();
        blocking(move || queue.ack_sync(&ids)).await
    }
}

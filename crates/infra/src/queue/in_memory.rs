use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

use cnjflow_core::{CnjMessage, Delivery, MessageId, QueueError, QueueService};

use super::{QueueConfig, QueueConsumer};

#[derive(Debug, Clone)]
struct Entry {
    id: MessageId,
    body: String,
    receive_count: u32,
}

#[derive(Debug, Default)]
struct State {
    ready: VecDeque<Entry>,
    inflight: HashMap<MessageId, (Entry, Instant)>,
    dead_letters: Vec<Delivery>,
}

/// In-process queue for tests/dev, with visibility timeout and dead-lettering.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    config: QueueConfig,
    state: Mutex<State>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Messages waiting to be received.
    pub fn ready_len(&self) -> usize {
        self.lock().ready.len()
    }

    /// Messages received but not yet acknowledged.
    pub fn in_flight_len(&self) -> usize {
        self.lock().inflight.len()
    }

    pub fn dead_letters(&self) -> Vec<Delivery> {
        self.lock().dead_letters.clone()
    }

    /// Enqueue a raw body (no serialization).
    pub fn push_raw(&self, body: impl Into<String>) -> MessageId {
        let id = MessageId::generate();
        self.lock().ready.push_back(Entry {
            id: id.clone(),
            body: body.into(),
            receive_count: 0,
        });
        self.notify.notify_one();
        id
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return expired in-flight messages to the queue (or dead-letter them),
    /// then take up to `max` ready messages.
    fn take_ready(&self, max: usize, now: Instant) -> (Vec<Delivery>, Option<Instant>) {
        let mut state = self.lock();

        let expired: Vec<MessageId> = state
            .inflight
            .iter()
            .filter(|(_, (_, visible_at))| *visible_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            let Some((entry, _)) = state.inflight.remove(&id) else {
                continue;
            };
            if entry.receive_count >= self.config.max_receive_count {
                warn!(
                    message_id = %entry.id,
                    receive_count = entry.receive_count,
                    "message sent to dead-letter queue"
                );
                state.dead_letters.push(Delivery {
                    message_id: entry.id,
                    body: entry.body,
                    receive_count: entry.receive_count,
                });
            } else {
                state.ready.push_front(entry);
            }
        }

        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(mut entry) = state.ready.pop_front() else {
                break;
            };
            entry.receive_count += 1;
            batch.push(Delivery {
                message_id: entry.id.clone(),
                body: entry.body.clone(),
                receive_count: entry.receive_count,
            });
            let visible_at = now + self.config.visibility_timeout;
            state.inflight.insert(entry.id.clone(), (entry, visible_at));
        }

        let next_visible = state.inflight.values().map(|(_, at)| *at).min();
        (batch, next_visible)
    }
}

#[async_trait]
impl QueueService for InMemoryQueue {
    async fn send(&self, message: &CnjMessage) -> Result<MessageId, QueueError> {
        let body =
            serde_json::to_string(message).map_err(|e| QueueError::Serialization(e.to_string()))?;
        Ok(self.push_raw(body))
    }
}

#[async_trait]
impl QueueConsumer for InMemoryQueue {
    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<Delivery>, QueueError> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let deadline = Instant::now() + wait;

        loop {
            let (batch, next_visible) = self.take_ready(max, Instant::now());
            if !batch.is_empty() {
                return Ok(batch);
            }
            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }

            let wake_at = next_visible.map_or(deadline, |at| at.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, self.notify.notified()).await;
        }
    }

    async fn ack(&self, ids: &[MessageId]) -> Result<(), QueueError> {
        let mut state = self.lock();
        for id in ids {
            if state.inflight.remove(id).is_none() {
                state.ready.retain(|entry| &entry.id != id);
            }
        }
        Ok(())
    }
}

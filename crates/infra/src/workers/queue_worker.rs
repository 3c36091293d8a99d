use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use cnjflow_core::{Delivery, MessageId};

use crate::queue::QueueConsumer;

use super::WorkerHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueWorkerConfig {
    /// Maximum messages handed to the handler at once.
    pub batch_size: usize,
    /// Long-poll wait per receive.
    pub wait: Duration,
    /// Pause after a failed receive.
    pub error_backoff: Duration,
}

impl Default for QueueWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            wait: Duration::from_millis(1_000),
            error_backoff: Duration::from_millis(1_000),
        }
    }
}

/// Queue polling loop.
///
/// - Receives batches from a `QueueConsumer`
/// - Hands each batch to `handler`, which returns the ids to acknowledge
/// - Leaves everything else for redelivery (handler must be idempotent)
#[derive(Debug)]
pub struct QueueWorker;

impl QueueWorker {
    pub fn spawn<C, H, Fut>(
        name: &'static str,
        consumer: Arc<C>,
        config: QueueWorkerConfig,
        handler: H,
    ) -> WorkerHandle
    where
        C: QueueConsumer + ?Sized + 'static,
        H: FnMut(Vec<Delivery>) -> Fut + Send + 'static,
        Fut: Future<Output = Vec<MessageId>> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(worker_loop(name, consumer, config, shutdown_rx, handler));

        WorkerHandle::new(shutdown_tx, join)
    }
}

async fn worker_loop<C, H, Fut>(
    name: &'static str,
    consumer: Arc<C>,
    config: QueueWorkerConfig,
    mut shutdown_rx: oneshot::Receiver<()>,
    mut handler: H,
) where
    C: QueueConsumer + ?Sized,
    H: FnMut(Vec<Delivery>) -> Fut,
    Fut: Future<Output = Vec<MessageId>>,
{
    info!(worker = name, "queue worker started");

    loop {
        let received = tokio::select! {
            _ = &mut shutdown_rx => break,
            received = consumer.receive(config.batch_size, config.wait) => received,
        };

        match received {
            Ok(batch) if batch.is_empty() => continue,
            Ok(batch) => {
                let size = batch.len();
                let done = handler(batch).await;
                debug!(worker = name, received = size, acked = done.len(), "batch handled");
                if let Err(err) = consumer.ack(&done).await {
                    warn!(worker = name, error = %err, "failed to acknowledge messages");
                }
            }
            Err(err) => {
                warn!(worker = name, error = %err, "queue receive failed");
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = tokio::time::sleep(config.error_backoff) => {}
                }
            }
        }
    }

    info!(worker = name, "queue worker stopped");
}

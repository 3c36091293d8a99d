//! Composition root: builds the adapters chosen by `AppConfig` and wires them
//! into the use cases.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use cnjflow_application::{BatchProcessor, ProcessCnjUseCase, ReceiveCnjUseCase};
use cnjflow_core::{CnjRepository, ExternalError, QueueError, QueueService, RepositoryError};
use cnjflow_infra::CircuitBreaker;
use cnjflow_infra::external::{HttpRegistryClient, RetryPolicy};
use cnjflow_infra::queue::{InMemoryQueue, QueueConsumer};
use cnjflow_infra::repository::{InMemoryCnjRepository, PostgresCnjRepository, RecordPurger};
use cnjflow_infra::workers::{PurgeWorker, QueueWorker, QueueWorkerConfig, WorkerHandle};

use crate::config::AppConfig;

const PURGE_INTERVAL: Duration = Duration::from_secs(3_600);
const REGISTRY_BREAKER: &str = "cnj-registry";

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("repository setup failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("queue setup failed: {0}")]
    Queue(#[from] QueueError),

    #[error("registry client setup failed: {0}")]
    External(#[from] ExternalError),
}

/// Shared handles used by the HTTP handlers and background workers.
#[derive(Clone)]
pub struct AppServices {
    pub receive: Arc<ReceiveCnjUseCase>,
    pub batch: Arc<BatchProcessor>,
    pub repository: Arc<dyn CnjRepository>,
    pub purger: Arc<dyn RecordPurger>,
    pub consumer: Arc<dyn QueueConsumer>,
    pub breaker: Arc<CircuitBreaker>,
    queue_batch_size: usize,
    queue_wait: Duration,
}

impl AppServices {
    pub async fn from_config(config: &AppConfig) -> Result<Self, ServicesError> {
        let (repository, purger) = build_repository(config).await?;
        let (queue, consumer) = build_queue(config).await?;

        let breaker = Arc::new(CircuitBreaker::new(REGISTRY_BREAKER, config.circuit));
        let registry = HttpRegistryClient::from_config(&config.registry, breaker.clone())?
            .with_retry_policy(RetryPolicy::default().with_max_retries(config.max_retries))
            .with_fallback(config.fallback_on_open);

        let process = ProcessCnjUseCase::new(repository.clone(), Arc::new(registry))
            .with_ttl_days(config.ttl_days);
        let batch = BatchProcessor::new(Arc::new(process)).with_concurrency(config.process_concurrency);

        Ok(Self {
            receive: Arc::new(ReceiveCnjUseCase::new(queue)),
            batch: Arc::new(batch),
            repository,
            purger,
            consumer,
            breaker,
            queue_batch_size: config.queue_batch_size,
            queue_wait: config.queue_wait,
        })
    }

    /// Start the queue consumer and the expiry sweeper.
    pub fn spawn_workers(&self) -> Vec<WorkerHandle> {
        vec![self.spawn_queue_worker(), PurgeWorker::spawn(self.purger.clone(), PURGE_INTERVAL)]
    }

    /// Consume the processing queue, acknowledging processed messages only.
    pub fn spawn_queue_worker(&self) -> WorkerHandle {
        let config = QueueWorkerConfig {
            batch_size: self.queue_batch_size,
            wait: self.queue_wait,
            ..QueueWorkerConfig::default()
        };
        let batch = self.batch.clone();

        QueueWorker::spawn("cnj.process", self.consumer.clone(), config, move |deliveries| {
            let batch = batch.clone();
            async move {
                let outcome = batch.process_batch(deliveries).await;
                if outcome.failed > 0 {
                    warn!(
                        processed = outcome.processed,
                        failed = outcome.failed,
                        "batch finished with failures; failed messages will be redelivered"
                    );
                }
                outcome.processed_ids()
            }
        })
    }
}

async fn build_repository(
    config: &AppConfig,
) -> Result<(Arc<dyn CnjRepository>, Arc<dyn RecordPurger>), ServicesError> {
    match &config.database_url {
        Some(url) => {
            let repo = Arc::new(PostgresCnjRepository::connect(url).await?);
            repo.ensure_schema().await?;
            info!("using Postgres CNJ repository");
            let repository: Arc<dyn CnjRepository> = repo.clone();
            let purger: Arc<dyn RecordPurger> = repo;
            Ok((repository, purger))
        }
        None => {
            warn!("DATABASE_URL not set; records are kept in memory");
            let repo = Arc::new(InMemoryCnjRepository::new());
            let repository: Arc<dyn CnjRepository> = repo.clone();
            let purger: Arc<dyn RecordPurger> = repo;
            Ok((repository, purger))
        }
    }
}

async fn build_queue(
    config: &AppConfig,
) -> Result<(Arc<dyn QueueService>, Arc<dyn QueueConsumer>), ServicesError> {
    match &config.redis_url {
        #[cfg(feature = "redis")]
        Some(url) => {
            use cnjflow_infra::queue::{QueueConfig, RedisStreamsQueue};

            let url = url.clone();
            let consumer_name = format!("consumer-{}", uuid::Uuid::now_v7());
            let queue = tokio::task::spawn_blocking(move || {
                RedisStreamsQueue::new(&url, consumer_name, QueueConfig::default())
            })
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))??;
            info!("using Redis Streams queue");
            let queue = Arc::new(queue);
            let sender: Arc<dyn QueueService> = queue.clone();
            let consumer: Arc<dyn QueueConsumer> = queue;
            Ok((sender, consumer))
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            warn!("REDIS_URL set but redis feature not enabled, falling back to in-memory queue");
            in_memory_queue()
        }
        None => in_memory_queue(),
    }
}

fn in_memory_queue() -> Result<(Arc<dyn QueueService>, Arc<dyn QueueConsumer>), ServicesError> {
    let queue = Arc::new(InMemoryQueue::new());
    let sender: Arc<dyn QueueService> = queue.clone();
    let consumer: Arc<dyn QueueConsumer> = queue;
    Ok((sender, consumer))
}

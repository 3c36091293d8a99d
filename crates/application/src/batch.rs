//! Batch entry for queue deliveries.
//!
//! Each delivery is decoded and run through the process use case on its own
//! task. One item never aborts its siblings; the aggregate counts what
//! happened to every item.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use cnjflow_core::{Delivery, MessageId};

use crate::dto::{ProcessCnjRequest, ProcessCnjResponse};
use crate::process::ProcessCnjUseCase;

/// What happened to one delivery.
///
/// Serialized flat: `{messageId, success, cnj, status, error?}` when the use
/// case returned, `{messageId, error}` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemOutcome {
    pub message_id: MessageId,
    /// Present when the use case returned, including recorded business failures.
    #[serde(flatten)]
    pub result: Option<ProcessCnjResponse>,
    /// Present when the item could not be decoded or its error propagated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemOutcome {
    fn returned(message_id: MessageId, result: ProcessCnjResponse) -> Self {
        Self {
            message_id,
            result: Some(result),
            error: None,
        }
    }

    fn errored(message_id: MessageId, error: impl Into<String>) -> Self {
        Self {
            message_id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Whether the use case returned a result for this item.
    pub fn is_processed(&self) -> bool {
        self.result.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub processed: usize,
    pub failed: usize,
    /// One entry per delivery, in input order.
    pub details: Vec<BatchItemOutcome>,
}

impl BatchOutcome {
    /// Message ids safe to acknowledge (the use case returned for them).
    pub fn processed_ids(&self) -> Vec<MessageId> {
        self.details
            .iter()
            .filter(|d| d.is_processed())
            .map(|d| d.message_id.clone())
            .collect()
    }
}

#[derive(Clone)]
pub struct BatchProcessor {
    use_case: Arc<ProcessCnjUseCase>,
    concurrency: usize,
}

impl BatchProcessor {
    /// Sequential processor (one item in flight at a time).
    pub fn new(use_case: Arc<ProcessCnjUseCase>) -> Self {
        Self {
            use_case,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` items in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn process_batch(&self, deliveries: Vec<Delivery>) -> BatchOutcome {
        let ids: Vec<MessageId> = deliveries.iter().map(|d| d.message_id.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, delivery) in deliveries.into_iter().enumerate() {
            let use_case = self.use_case.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                (index, process_one(&use_case, delivery).await)
            });
        }

        let mut slots: Vec<Option<BatchItemOutcome>> = vec![None; ids.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!(error = %e, "batch item task aborted"),
            }
        }

        let mut outcome = BatchOutcome::default();
        for (slot, id) in slots.into_iter().zip(ids) {
            let item = slot.unwrap_or_else(|| BatchItemOutcome::errored(id, "processing task aborted"));
            if item.is_processed() {
                outcome.processed += 1;
            } else {
                outcome.failed += 1;
            }
            outcome.details.push(item);
        }

        info!(
            processed = outcome.processed,
            failed = outcome.failed,
            "batch processing finished"
        );
        outcome
    }
}

async fn process_one(use_case: &ProcessCnjUseCase, delivery: Delivery) -> BatchItemOutcome {
    let message = match delivery.decode() {
        Ok(message) => message,
        Err(e) => {
            warn!(message_id = %delivery.message_id, error = %e, "undecodable queue message");
            return BatchItemOutcome::errored(delivery.message_id, e.to_string());
        }
    };

    let message_id = delivery.message_id;
    let request = ProcessCnjRequest::from_message(message, message_id.clone());
    match use_case.execute(request).await {
        Ok(response) => BatchItemOutcome::returned(message_id, response),
        Err(e) => {
            error!(message_id = %message_id, error = %e, "batch item failed");
            BatchItemOutcome::errored(message_id, e.to_string())
        }
    }
}

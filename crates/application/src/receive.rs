//! Receive path: validate a submitted number and enqueue it for processing.
//!
//! Nothing is persisted here; the first durable record is written by the
//! process path.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use cnjflow_core::{Cnj, CnjMessage, CnjNumber, DomainError, QueueError, QueueService};

use crate::dto::{ReceiveCnjRequest, ReceiveCnjResponse};

/// Acknowledgement text returned to callers.
pub const RECEIVED_MESSAGE: &str = "CNJ recebido para processamento";

#[derive(Debug, Error)]
pub enum ReceiveError {
    /// The number does not match the canonical format.
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub struct ReceiveCnjUseCase {
    queue: Arc<dyn QueueService>,
}

impl ReceiveCnjUseCase {
    pub fn new(queue: Arc<dyn QueueService>) -> Self {
        Self { queue }
    }

    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub async fn execute(
        &self,
        request: ReceiveCnjRequest,
    ) -> Result<ReceiveCnjResponse, ReceiveError> {
        let number = CnjNumber::parse(request.cnj.as_str()).map_err(|e| {
            warn!(cnj = %request.cnj, "rejected malformed CNJ");
            e
        })?;

        let cnj = Cnj::received(number, request.request_id);
        let message = CnjMessage {
            cnj: cnj.number().to_string(),
            timestamp: cnj.received_at(),
            request_id: cnj.request_id().clone(),
        };

        let tracking_id = self.queue.send(&message).await.map_err(|e| {
            error!(cnj = %message.cnj, error = %e, "failed to enqueue CNJ");
            e
        })?;

        info!(cnj = %message.cnj, message_id = %tracking_id, "CNJ queued for processing");

        Ok(ReceiveCnjResponse {
            message: RECEIVED_MESSAGE.to_string(),
            id: message.cnj,
            status: "processing".to_string(),
            tracking_id,
        })
    }
}

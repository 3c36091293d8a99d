use serde::{Deserialize, Serialize};

use cnjflow_core::{Delivery, MessageId};
use cnjflow_infra::CircuitSnapshot;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SubmitCnjRequest {
    #[serde(default)]
    pub cnj: Option<String>,
}

/// Batch of queue records handed to the process entry.
#[derive(Debug, Deserialize)]
pub struct ProcessBatchRequest {
    #[serde(default)]
    pub records: Vec<QueueRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub message_id: String,
    /// JSON-encoded queue message.
    pub body: String,
}

impl From<QueueRecord> for Delivery {
    fn from(record: QueueRecord) -> Self {
        Delivery::new(MessageId::new(record.message_id), record.body)
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub circuit: CircuitSnapshot,
}

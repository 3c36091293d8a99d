//! Use case inputs and outputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cnjflow_core::{CnjMessage, CnjStatus, MessageId, RequestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveCnjRequest {
    /// Raw, unvalidated number as submitted by the caller.
    pub cnj: String,
    pub request_id: RequestId,
}

/// Acknowledgement returned once a number has been queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveCnjResponse {
    pub message: String,
    /// The submitted number.
    pub id: String,
    /// Always `"processing"`.
    pub status: String,
    /// Queue message id.
    pub tracking_id: MessageId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCnjRequest {
    pub cnj: String,
    pub request_id: RequestId,
    pub timestamp: DateTime<Utc>,
    pub message_id: MessageId,
}

impl ProcessCnjRequest {
    pub fn from_message(message: CnjMessage, message_id: MessageId) -> Self {
        Self {
            cnj: message.cnj,
            request_id: message.request_id,
            timestamp: message.timestamp,
            message_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessCnjResponse {
    pub success: bool,
    pub cnj: String,
    pub status: CnjStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessCnjResponse {
    pub fn processed(cnj: impl Into<String>) -> Self {
        Self {
            success: true,
            cnj: cnj.into(),
            status: CnjStatus::Processed,
            error: None,
        }
    }

    pub fn failed(cnj: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            cnj: cnj.into(),
            status: CnjStatus::Failed,
            error: Some(error.into()),
        }
    }
}

//! Port contracts the application layer depends on.
//!
//! Storage, queue transport and the registry client are collaborators; the
//! core only sees these traits. All ports are `Send + Sync` so a single
//! instance can be shared (`Arc<dyn ...>`) across concurrently processed
//! messages.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cnj::{Cnj, ExternalPayload, StatusUpdate};
use crate::error::{ExternalError, QueueError, RepositoryError};
use crate::id::{MessageId, RequestId};

/// Body of a queued processing request.
///
/// `cnj` is kept as a raw string: the queue may carry messages that did not
/// come through the receive path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CnjMessage {
    pub cnj: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: RequestId,
}

/// One queued message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub message_id: MessageId,
    pub body: String,
    /// How many times this message has been handed out (1 on first delivery).
    #[serde(default = "first_delivery")]
    pub receive_count: u32,
}

fn first_delivery() -> u32 {
    1
}

impl Delivery {
    pub fn new(message_id: MessageId, body: impl Into<String>) -> Self {
        Self {
            message_id,
            body: body.into(),
            receive_count: 1,
        }
    }

    pub fn decode(&self) -> Result<CnjMessage, QueueError> {
        serde_json::from_str(&self.body).map_err(|e| QueueError::Serialization(e.to_string()))
    }
}

/// Persistence contract for CNJ records.
///
/// `save` is an upsert keyed by `number`: a later save for the same number
/// supersedes the earlier one.
#[async_trait]
pub trait CnjRepository: Send + Sync {
    async fn save(&self, cnj: &Cnj) -> Result<(), RepositoryError>;

    async fn find_by_number(&self, number: &str) -> Result<Option<Cnj>, RepositoryError>;

    /// Change the status of an existing record. Fails with `NotFound` when
    /// nothing is stored under `number`.
    async fn update_status(&self, number: &str, update: StatusUpdate) -> Result<(), RepositoryError>;
}

/// Submission side of the processing queue.
#[async_trait]
pub trait QueueService: Send + Sync {
    async fn send(&self, message: &CnjMessage) -> Result<MessageId, QueueError>;
}

/// External registry lookup.
#[async_trait]
pub trait ExternalCnjService: Send + Sync {
    async fn fetch_cnj_data(&self, number: &str) -> Result<ExternalPayload, ExternalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_wire_format() {
        let msg = CnjMessage {
            cnj: "1234567-12.1234.1.12.1234".into(),
            timestamp: DateTime::parse_from_rfc3339("2023-06-10T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            request_id: RequestId::new("req-123"),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["cnj"], "1234567-12.1234.1.12.1234");
        assert_eq!(json["requestId"], "req-123");
        assert_eq!(json["timestamp"], "2023-06-10T12:00:00Z");
    }

    #[test]
    fn delivery_decodes_body() {
        let body = r#"{"cnj":"bad","timestamp":"2023-06-10T12:00:00Z","requestId":"r1"}"#;
        let delivery = Delivery::new(MessageId::new("m1"), body);
        let msg = delivery.decode().unwrap();
        assert_eq!(msg.cnj, "bad");
        assert_eq!(msg.request_id.as_str(), "r1");

        let broken = Delivery::new(MessageId::new("m2"), "{not json");
        assert!(matches!(broken.decode(), Err(QueueError::Serialization(_))));
    }
}

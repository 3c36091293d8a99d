//! Persistence layout of a CNJ record.
//!
//! `CnjRecord` is the flat, serializable shape storage adapters read and
//! write. It is keyed by `number`; `ttl` is an expiry hint (epoch seconds)
//! that backends may use to drop old records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cnj::{Cnj, CnjStatus, ExternalPayload, StatusUpdate};
use crate::id::RequestId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CnjRecord {
    #[serde(rename = "cnj")]
    pub number: String,
    pub received_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    pub status: CnjStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_data: Option<ExternalPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub request_id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl CnjRecord {
    /// Apply a storage-level status change.
    ///
    /// Keeps the record invariants: `processed_at` is set only for terminal
    /// statuses, and at most one of `external_data`/`error` is populated.
    pub fn apply_status_update(&mut self, update: StatusUpdate, now: DateTime<Utc>) {
        self.status = update.status();
        match update {
            StatusUpdate::Processing => {
                self.processed_at = None;
                self.external_data = None;
                self.error = None;
            }
            StatusUpdate::Processed(data) => {
                self.processed_at = Some(now);
                self.external_data = Some(data);
                self.error = None;
            }
            StatusUpdate::Failed(reason) => {
                self.processed_at = Some(now);
                self.external_data = None;
                self.error = Some(reason);
            }
        }
    }

    /// Whether the expiry hint has passed at `now_epoch_secs`.
    pub fn is_expired(&self, now_epoch_secs: i64) -> bool {
        self.ttl.is_some_and(|ttl| ttl <= now_epoch_secs)
    }

    pub fn into_entity(self) -> Cnj {
        Cnj::from_parts(
            self.number,
            self.received_at,
            self.processed_at,
            self.status,
            self.external_data,
            self.error,
            self.request_id,
            self.ttl,
        )
    }
}

impl From<&Cnj> for CnjRecord {
    fn from(cnj: &Cnj) -> Self {
        Self {
            number: cnj.number().to_string(),
            received_at: cnj.received_at(),
            processed_at: cnj.processed_at(),
            status: cnj.status(),
            external_data: cnj.external_data().cloned(),
            error: cnj.error().map(str::to_string),
            request_id: cnj.request_id().clone(),
            ttl: cnj.ttl(),
        }
    }
}

impl From<CnjRecord> for Cnj {
    fn from(record: CnjRecord) -> Self {
        record.into_entity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::CnjNumber;

    fn processing_record() -> CnjRecord {
        let cnj = Cnj::processing(
            CnjNumber::parse("1234567-12.1234.1.12.1234").unwrap(),
            Utc::now(),
            RequestId::new("req-1"),
        );
        CnjRecord::from(&cnj)
    }

    #[test]
    fn entity_survives_the_persistence_layout() {
        let mut cnj = Cnj::processing(
            CnjNumber::parse("1234567-12.1234.1.12.1234").unwrap(),
            Utc::now(),
            RequestId::new("req-1"),
        );
        cnj.set_ttl(90);
        cnj.mark_as_processed(ExternalPayload::new(serde_json::json!({"court": "TJ-SP"})))
            .unwrap();

        let restored: Cnj = CnjRecord::from(&cnj).into();
        assert_eq!(restored, cnj);
    }

    #[test]
    fn json_layout_uses_original_field_names() {
        let record = processing_record();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["cnj"], "1234567-12.1234.1.12.1234");
        assert_eq!(json["status"], "PROCESSING");
        assert_eq!(json["requestId"], "req-1");
        assert!(json.get("receivedAt").is_some());
        assert!(json.get("processedAt").is_none());
        assert!(json.get("externalData").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn status_update_keeps_terminal_fields_exclusive() {
        let now = Utc::now();
        let mut record = processing_record();

        record.apply_status_update(
            StatusUpdate::Processed(ExternalPayload::new(serde_json::json!({"a": 1}))),
            now,
        );
        assert_eq!(record.status, CnjStatus::Processed);
        assert_eq!(record.processed_at, Some(now));
        assert!(record.external_data.is_some());
        assert!(record.error.is_none());

        record.apply_status_update(StatusUpdate::Failed("boom".into()), now);
        assert_eq!(record.status, CnjStatus::Failed);
        assert!(record.external_data.is_none());
        assert_eq!(record.error.as_deref(), Some("boom"));

        record.apply_status_update(StatusUpdate::Processing, now);
        assert_eq!(record.status, CnjStatus::Processing);
        assert!(record.processed_at.is_none());
        assert!(record.error.is_none());
    }

    #[test]
    fn expiry_hint() {
        let mut record = processing_record();
        assert!(!record.is_expired(i64::MAX));

        record.ttl = Some(100);
        assert!(record.is_expired(100));
        assert!(!record.is_expired(99));
    }
}

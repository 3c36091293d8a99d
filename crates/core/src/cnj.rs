//! The CNJ record entity and its status state machine.
//!
//! ```text
//! RECEIVED ──► PROCESSING ──► PROCESSED
//!                   │
//!                   └───────► FAILED
//! ```
//!
//! Transitions are monotonic within one processing attempt. A re-delivered
//! message does not rewind an existing entity: the processing path builds a
//! fresh entity on the same identity and saves it over the old record.
//!
//! Mutators only change in-memory state; persistence is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::RequestId;
use crate::number::CnjNumber;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Processing status of a CNJ record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CnjStatus {
    Received,
    Processing,
    Processed,
    Failed,
}

impl CnjStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CnjStatus::Processed | CnjStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CnjStatus::Received => "RECEIVED",
            CnjStatus::Processing => "PROCESSING",
            CnjStatus::Processed => "PROCESSED",
            CnjStatus::Failed => "FAILED",
        }
    }
}

impl core::fmt::Display for CnjStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for CnjStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RECEIVED" => Ok(CnjStatus::Received),
            "PROCESSING" => Ok(CnjStatus::Processing),
            "PROCESSED" => Ok(CnjStatus::Processed),
            "FAILED" => Ok(CnjStatus::Failed),
            other => Err(DomainError::validation(format!("unknown CNJ status: {other}"))),
        }
    }
}

/// Opaque payload returned by the external registry.
///
/// The pipeline stores and forwards it without looking inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalPayload(serde_json::Value);

impl ExternalPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_json(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for ExternalPayload {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// A storage-level status change, the typed form of `(status, data?)`.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    Processing,
    Processed(ExternalPayload),
    Failed(String),
}

impl StatusUpdate {
    pub fn status(&self) -> CnjStatus {
        match self {
            StatusUpdate::Processing => CnjStatus::Processing,
            StatusUpdate::Processed(_) => CnjStatus::Processed,
            StatusUpdate::Failed(_) => CnjStatus::Failed,
        }
    }
}

/// CNJ record entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Cnj {
    number: String,
    received_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    status: CnjStatus,
    external_data: Option<ExternalPayload>,
    error: Option<String>,
    request_id: RequestId,
    ttl: Option<i64>,
}

impl Cnj {
    /// New record on the receive path, stamped with the current time.
    pub fn received(number: CnjNumber, request_id: RequestId) -> Self {
        Self::received_on(number, request_id, Utc::now())
    }

    pub fn received_on(number: CnjNumber, request_id: RequestId, at: DateTime<Utc>) -> Self {
        Self {
            number: number.into_inner(),
            received_at: at,
            processed_at: None,
            status: CnjStatus::Received,
            external_data: None,
            error: None,
            request_id,
            ttl: None,
        }
    }

    /// Fresh record for a processing attempt, rebuilt from a queued message.
    pub fn processing(number: CnjNumber, received_at: DateTime<Utc>, request_id: RequestId) -> Self {
        Self {
            status: CnjStatus::Processing,
            ..Self::received_on(number, request_id, received_at)
        }
    }

    /// Fresh FAILED record for the failure path.
    ///
    /// Takes the raw number so a message that never passed validation can still
    /// leave an audit record behind.
    pub fn failed(
        number: impl Into<String>,
        received_at: DateTime<Utc>,
        request_id: RequestId,
        error: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            received_at,
            processed_at: Some(Utc::now()),
            status: CnjStatus::Failed,
            external_data: None,
            error: Some(error.into()),
            request_id,
            ttl: None,
        }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn status(&self) -> CnjStatus {
        self.status
    }

    pub fn external_data(&self) -> Option<&ExternalPayload> {
        self.external_data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn ttl(&self) -> Option<i64> {
        self.ttl
    }

    /// RECEIVED → PROCESSING.
    pub fn mark_as_processing(&mut self) -> DomainResult<()> {
        match self.status {
            CnjStatus::Received => {
                self.status = CnjStatus::Processing;
                Ok(())
            }
            CnjStatus::Processing => Ok(()),
            terminal => Err(DomainError::invariant(format!(
                "cannot move CNJ {} from {terminal} to PROCESSING",
                self.number
            ))),
        }
    }

    /// Terminal transition to PROCESSED.
    pub fn mark_as_processed(&mut self, data: ExternalPayload) -> DomainResult<()> {
        self.ensure_not_terminal(CnjStatus::Processed)?;
        self.status = CnjStatus::Processed;
        self.external_data = Some(data);
        self.error = None;
        self.processed_at = Some(Utc::now());
        Ok(())
    }

    /// Terminal transition to FAILED.
    pub fn mark_as_failed(&mut self, reason: impl Into<String>) -> DomainResult<()> {
        self.ensure_not_terminal(CnjStatus::Failed)?;
        self.status = CnjStatus::Failed;
        self.error = Some(reason.into());
        self.external_data = None;
        self.processed_at = Some(Utc::now());
        Ok(())
    }

    /// Set the expiry hint to `now + days`, in epoch seconds.
    pub fn set_ttl(&mut self, days: i64) {
        self.set_ttl_at(Utc::now(), days);
    }

    /// Saturates at the `i64` bounds instead of overflowing.
    pub fn set_ttl_at(&mut self, now: DateTime<Utc>, days: i64) {
        self.ttl = Some(now.timestamp().saturating_add(days.saturating_mul(SECONDS_PER_DAY)));
    }

    fn ensure_not_terminal(&self, target: CnjStatus) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "cannot move CNJ {} from {} to {target}",
                self.number, self.status
            )));
        }
        Ok(())
    }

    /// Rebuild from persisted parts. Used by `CnjRecord`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        number: String,
        received_at: DateTime<Utc>,
        processed_at: Option<DateTime<Utc>>,
        status: CnjStatus,
        external_data: Option<ExternalPayload>,
        error: Option<String>,
        request_id: RequestId,
        ttl: Option<i64>,
    ) -> Self {
        Self {
            number,
            received_at,
            processed_at,
            status,
            external_data,
            error,
            request_id,
            ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "1234567-12.1234.1.12.1234";

    fn received() -> Cnj {
        let at = DateTime::parse_from_rfc3339("2023-06-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Cnj::received_on(CnjNumber::parse(VALID).unwrap(), RequestId::new("req-123"), at)
    }

    #[test]
    fn new_record_starts_received() {
        let cnj = received();
        assert_eq!(cnj.number(), VALID);
        assert_eq!(cnj.status(), CnjStatus::Received);
        assert_eq!(cnj.request_id().as_str(), "req-123");
        assert!(cnj.processed_at().is_none());
        assert!(cnj.external_data().is_none());
        assert!(cnj.error().is_none());
        assert!(cnj.ttl().is_none());
    }

    #[test]
    fn mark_as_processed_sets_payload_and_timestamp() {
        let mut cnj = received();
        cnj.mark_as_processing().unwrap();
        assert!(cnj.processed_at().is_none());

        let data = ExternalPayload::new(serde_json::json!({"status": "active", "court": "TJ-SP"}));
        cnj.mark_as_processed(data.clone()).unwrap();

        assert_eq!(cnj.status(), CnjStatus::Processed);
        assert_eq!(cnj.external_data(), Some(&data));
        assert!(cnj.error().is_none());
        assert!(cnj.processed_at().is_some());
    }

    #[test]
    fn mark_as_failed_sets_error_and_timestamp() {
        let mut cnj = received();
        cnj.mark_as_failed("API timeout").unwrap();

        assert_eq!(cnj.status(), CnjStatus::Failed);
        assert_eq!(cnj.error(), Some("API timeout"));
        assert!(cnj.external_data().is_none());
        assert!(cnj.processed_at().is_some());
    }

    #[test]
    fn terminal_transitions_are_exclusive() {
        let mut cnj = received();
        cnj.mark_as_processed(ExternalPayload::new(serde_json::json!({}))).unwrap();

        let err = cnj.mark_as_failed("late failure").unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(cnj.status(), CnjStatus::Processed);
        assert!(cnj.error().is_none());

        let mut cnj = received();
        cnj.mark_as_failed("boom").unwrap();
        assert!(cnj.mark_as_processed(ExternalPayload::new(serde_json::json!({}))).is_err());
        assert!(cnj.mark_as_processing().is_err());
        assert!(cnj.external_data().is_none());
    }

    #[test]
    fn processing_constructor_keeps_message_fields() {
        let at = Utc::now();
        let cnj = Cnj::processing(CnjNumber::parse(VALID).unwrap(), at, RequestId::new("r"));
        assert_eq!(cnj.status(), CnjStatus::Processing);
        assert_eq!(cnj.received_at(), at);
        assert!(cnj.processed_at().is_none());
    }

    #[test]
    fn failed_constructor_accepts_raw_number() {
        let cnj = Cnj::failed("not-a-cnj", Utc::now(), RequestId::new("r"), "invalid CNJ format");
        assert_eq!(cnj.number(), "not-a-cnj");
        assert_eq!(cnj.status(), CnjStatus::Failed);
        assert!(cnj.processed_at().is_some());
        assert!(cnj.external_data().is_none());
    }

    #[test]
    fn set_ttl_is_days_from_now_in_seconds() {
        let mut cnj = received();
        let now_secs = Utc::now().timestamp();
        cnj.set_ttl(90);

        let expected = now_secs + 90 * 86_400;
        let ttl = cnj.ttl().unwrap();
        assert!(ttl >= expected - 1 && ttl <= expected + 1);
    }

    #[test]
    fn set_ttl_at_is_deterministic() {
        let mut cnj = received();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        cnj.set_ttl_at(now, 1);
        assert_eq!(cnj.ttl(), Some(1_700_086_400));
    }

    #[test]
    fn huge_ttl_saturates_instead_of_overflowing() {
        let mut cnj = received();
        cnj.set_ttl(i64::MAX / 1000);
        assert_eq!(cnj.ttl(), Some(i64::MAX));

        cnj.set_ttl(i64::MIN);
        assert_eq!(cnj.ttl(), Some(i64::MIN));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            CnjStatus::Received,
            CnjStatus::Processing,
            CnjStatus::Processed,
            CnjStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<CnjStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<CnjStatus>().is_err());
        assert_eq!(
            serde_json::to_string(&CnjStatus::Processing).unwrap(),
            "\"PROCESSING\""
        );
    }
}

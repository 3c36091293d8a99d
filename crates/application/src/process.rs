//! Process path: fetch registry data for one queued number and persist the
//! outcome.
//!
//! ```text
//! message
//!   ↓
//! 1. PROCESSING checkpoint (fresh entity, TTL, save)
//!   ↓
//! 2. registry fetch
//!   ↓
//! 3. PROCESSED (payload, save)
//!
//! any failure in 1-3 → fresh FAILED entity (error, TTL, save)
//! ```
//!
//! Business failures are recorded and reported in the response. Only a failure
//! to persist the FAILED record escapes as an error.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument, warn};

use cnjflow_core::{
    Cnj, CnjNumber, CnjRepository, DomainError, ExternalCnjService, ExternalError,
    RepositoryError,
};

use crate::dto::{ProcessCnjRequest, ProcessCnjResponse};

/// Retention applied to every record written by the process path.
pub const DEFAULT_TTL_DAYS: i64 = 90;

#[derive(Debug, Error)]
pub enum ProcessError {
    /// The failure record itself could not be written.
    #[error("failed to persist CNJ record: {0}")]
    Persistence(#[from] RepositoryError),
}

/// Failure inside one processing attempt; recorded on the FAILED entity.
#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Persistence(#[from] RepositoryError),

    #[error(transparent)]
    External(#[from] ExternalError),
}

pub struct ProcessCnjUseCase {
    repository: Arc<dyn CnjRepository>,
    external: Arc<dyn ExternalCnjService>,
    ttl_days: i64,
}

impl ProcessCnjUseCase {
    pub fn new(repository: Arc<dyn CnjRepository>, external: Arc<dyn ExternalCnjService>) -> Self {
        Self {
            repository,
            external,
            ttl_days: DEFAULT_TTL_DAYS,
        }
    }

    pub fn with_ttl_days(mut self, ttl_days: i64) -> Self {
        self.ttl_days = ttl_days;
        self
    }

    #[instrument(
        skip(self, request),
        fields(cnj = %request.cnj, request_id = %request.request_id, message_id = %request.message_id)
    )]
    pub async fn execute(
        &self,
        request: ProcessCnjRequest,
    ) -> Result<ProcessCnjResponse, ProcessError> {
        match self.attempt(&request).await {
            Ok(()) => {
                info!(status = "PROCESSED", "CNJ processed");
                Ok(ProcessCnjResponse::processed(request.cnj))
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(status = "FAILED", error = %reason, "CNJ processing failed");
                self.record_failure(&request, &reason).await?;
                Ok(ProcessCnjResponse::failed(request.cnj, reason))
            }
        }
    }

    async fn attempt(&self, request: &ProcessCnjRequest) -> Result<(), AttemptError> {
        // Messages may reach the queue without going through the receive path.
        let number = CnjNumber::parse(request.cnj.as_str())?;

        let mut cnj = Cnj::processing(number, request.timestamp, request.request_id.clone());
        cnj.set_ttl(self.ttl_days);
        self.repository.save(&cnj).await?;

        let data = self.external.fetch_cnj_data(cnj.number()).await?;

        cnj.mark_as_processed(data)?;
        self.repository.save(&cnj).await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        request: &ProcessCnjRequest,
        reason: &str,
    ) -> Result<(), ProcessError> {
        let mut failed = Cnj::failed(
            request.cnj.as_str(),
            request.timestamp,
            request.request_id.clone(),
            reason,
        );
        failed.set_ttl(self.ttl_days);

        self.repository.save(&failed).await.map_err(|e| {
            error!(error = %e, "failed to persist FAILED record");
            ProcessError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryRepository, ScriptedRegistry};
    use chrono::Utc;
    use cnjflow_core::{CnjStatus, ExternalPayload, MessageId, RequestId};

    const VALID: &str = "1234567-12.1234.1.12.1234";

    fn request(cnj: &str) -> ProcessCnjRequest {
        ProcessCnjRequest {
            cnj: cnj.to_string(),
            request_id: RequestId::new("req-123"),
            timestamp: Utc::now(),
            message_id: MessageId::new("msg-123"),
        }
    }

    fn use_case(
        repo: &Arc<MemoryRepository>,
        registry: &Arc<ScriptedRegistry>,
    ) -> ProcessCnjUseCase {
        ProcessCnjUseCase::new(repo.clone(), registry.clone())
    }

    #[tokio::test]
    async fn successful_fetch_checkpoints_then_completes() {
        let repo = Arc::new(MemoryRepository::default());
        let payload = ExternalPayload::new(serde_json::json!({"status": "active", "court": "TJ-SP"}));
        let registry = Arc::new(ScriptedRegistry::answering(vec![Ok(payload.clone())]));

        let response = use_case(&repo, &registry).execute(request(VALID)).await.unwrap();

        assert!(response.success);
        assert_eq!(response.status, CnjStatus::Processed);
        assert_eq!(response.cnj, VALID);
        assert!(response.error.is_none());

        assert_eq!(
            repo.saved_statuses(),
            vec![CnjStatus::Processing, CnjStatus::Processed]
        );
        let stored = repo.stored(VALID).unwrap();
        assert_eq!(stored.external_data(), Some(&payload));
        assert!(stored.processed_at().is_some());
        assert_eq!(stored.request_id().as_str(), "req-123");
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test]
    async fn registry_failure_is_recorded_as_failed() {
        let repo = Arc::new(MemoryRepository::default());
        let registry = Arc::new(ScriptedRegistry::answering(vec![Err(
            ExternalError::no_response("API timeout"),
        )]));

        let response = use_case(&repo, &registry).execute(request(VALID)).await.unwrap();

        assert!(!response.success);
        assert_eq!(response.status, CnjStatus::Failed);
        assert_eq!(
            response.error.as_deref(),
            Some("Failed to fetch CNJ data: API timeout")
        );

        assert_eq!(
            repo.saved_statuses(),
            vec![CnjStatus::Processing, CnjStatus::Failed]
        );
        let stored = repo.stored(VALID).unwrap();
        assert_eq!(stored.status(), CnjStatus::Failed);
        assert!(stored.external_data().is_none());
        assert!(stored.processed_at().is_some());
    }

    #[tokio::test]
    async fn every_written_record_carries_the_retention_hint() {
        let repo = Arc::new(MemoryRepository::default());
        let registry = Arc::new(ScriptedRegistry::default());
        let before = Utc::now().timestamp();

        use_case(&repo, &registry)
            .with_ttl_days(1)
            .execute(request(VALID))
            .await
            .unwrap();

        for saved in repo.saves.lock().unwrap().iter() {
            let ttl = saved.ttl().unwrap();
            assert!(ttl >= before + 86_400 && ttl <= before + 86_400 + 5);
        }
    }

    #[tokio::test]
    async fn malformed_number_fails_without_fetching() {
        let repo = Arc::new(MemoryRepository::default());
        let registry = Arc::new(ScriptedRegistry::default());

        let response = use_case(&repo, &registry).execute(request("bad-number")).await.unwrap();

        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("invalid CNJ format"));
        assert_eq!(registry.calls(), 0);
        assert_eq!(repo.saved_statuses(), vec![CnjStatus::Failed]);
        assert_eq!(repo.stored("bad-number").unwrap().status(), CnjStatus::Failed);
    }

    #[tokio::test]
    async fn checkpoint_failure_skips_fetch_and_records_failure() {
        let repo = Arc::new(MemoryRepository::failing_on(CnjStatus::Processing));
        let registry = Arc::new(ScriptedRegistry::default());

        let response = use_case(&repo, &registry).execute(request(VALID)).await.unwrap();

        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("storage error: database unavailable")
        );
        assert_eq!(registry.calls(), 0);
        assert_eq!(repo.saved_statuses(), vec![CnjStatus::Failed]);
    }

    #[tokio::test]
    async fn failure_record_persistence_error_propagates() {
        let repo = Arc::new(MemoryRepository::failing_on(CnjStatus::Failed));
        let registry = Arc::new(ScriptedRegistry::answering(vec![Err(
            ExternalError::from_status(404, "not found"),
        )]));

        let err = use_case(&repo, &registry)
            .execute(request(VALID))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProcessError::Persistence(RepositoryError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn redelivery_supersedes_previous_outcome() {
        let repo = Arc::new(MemoryRepository::default());
        let registry = Arc::new(ScriptedRegistry::answering(vec![Err(
            ExternalError::from_status(503, "unavailable"),
        )]));
        let use_case = use_case(&repo, &registry);

        let first = use_case.execute(request(VALID)).await.unwrap();
        assert!(!first.success);
        assert_eq!(repo.stored(VALID).unwrap().status(), CnjStatus::Failed);

        let second = use_case.execute(request(VALID)).await.unwrap();
        assert!(second.success);
        let stored = repo.stored(VALID).unwrap();
        assert_eq!(stored.status(), CnjStatus::Processed);
        assert!(stored.error().is_none());
    }
}

//! Resilient registry client: retry with backoff inside a circuit breaker.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, instrument, warn};

use cnjflow_core::{ExternalCnjService, ExternalError, ExternalPayload};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::external::retry::{RetryPolicy, retry_with_backoff};
use crate::external::transport::{RegistryConfig, RegistryTransport, ReqwestTransport};

/// Synthetic payload returned while the circuit is open.
pub fn fallback_payload(number: &str) -> ExternalPayload {
    ExternalPayload::new(serde_json::json!({
        "status": "FALLBACK",
        "cnj": number,
        "message": "CNJ registry temporarily unavailable",
    }))
}

/// The whole retry sequence counts as one call for the breaker, so a lookup
/// that exhausts its retries is a single failure.
pub struct HttpRegistryClient<T> {
    transport: T,
    retry: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
    fallback_on_open: bool,
}

impl HttpRegistryClient<ReqwestTransport> {
    pub fn from_config(
        config: &RegistryConfig,
        breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, ExternalError> {
        Ok(Self::new(ReqwestTransport::new(config)?, breaker))
    }
}

impl<T: RegistryTransport> HttpRegistryClient<T> {
    pub fn new(transport: T, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            breaker,
            fallback_on_open: true,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// When disabled, an open circuit surfaces as `ExternalError::CircuitOpen`.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_on_open = enabled;
        self
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl<T: RegistryTransport> ExternalCnjService for HttpRegistryClient<T> {
    #[instrument(skip(self), fields(cnj = %number))]
    async fn fetch_cnj_data(&self, number: &str) -> Result<ExternalPayload, ExternalError> {
        let result = self
            .breaker
            .call(|| retry_with_backoff(&self.retry, || self.transport.get_process(number)))
            .await;

        match result {
            Ok(payload) => Ok(payload),
            Err(CircuitBreakerError::Inner(err)) => {
                error!(status = ?err.status(), error = %err, "registry lookup failed");
                Err(err)
            }
            Err(CircuitBreakerError::Open) if self.fallback_on_open => {
                warn!("circuit open, returning fallback payload");
                Ok(fallback_payload(number))
            }
            Err(CircuitBreakerError::Open) => Err(ExternalError::CircuitOpen),
        }
    }
}

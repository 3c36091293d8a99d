//! HTTP transport to the CNJ registry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};

use cnjflow_core::{ExternalError, ExternalPayload};

/// One raw registry lookup, with failures already classified.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    async fn get_process(&self, number: &str) -> Result<ExternalPayload, ExternalError>;
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl RegistryConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_millis(5_000),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `GET {base_url}/process/{number}` over reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &RegistryConfig) -> Result<Self, ExternalError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| ExternalError::Configuration(format!("invalid API key header: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| ExternalError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RegistryTransport for ReqwestTransport {
    async fn get_process(&self, number: &str) -> Result<ExternalPayload, ExternalError> {
        let url = format!("{}/process/{}", self.base_url, number);

        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ExternalError::no_response(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(ExternalError::from_status(
                status.as_u16(),
                format!("Request failed with status code {}", status.as_u16()),
            ));
        }

        res.json::<serde_json::Value>()
            .await
            .map(ExternalPayload::new)
            .map_err(|e| {
                if e.is_decode() {
                    ExternalError::InvalidResponse(e.to_string())
                } else {
                    ExternalError::no_response(e.to_string())
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_with_control_characters_is_a_configuration_error() {
        let config = RegistryConfig::new("http://localhost:3001", "secret\nX-Injected: 1");
        let err = ReqwestTransport::new(&config).unwrap_err();

        assert!(matches!(err, ExternalError::Configuration(_)));
        assert!(!err.is_transient());
        assert!(err.to_string().starts_with("invalid registry client configuration"));
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let transport = ReqwestTransport::new(&RegistryConfig::new("http://registry.test/", "k")).unwrap();
        assert_eq!(transport.base_url, "http://registry.test");
    }
}

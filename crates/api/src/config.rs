//! Process configuration, read from the environment once at startup.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use cnjflow_application::DEFAULT_TTL_DAYS;
use cnjflow_infra::CircuitBreakerConfig;
use cnjflow_infra::external::RegistryConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_EXTERNAL_API_URL: &str = "http://localhost:3001";
/// Upper bound for `RECORD_TTL_DAYS` (about a century).
pub const MAX_TTL_DAYS: i64 = 36_500;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub registry: RegistryConfig,
    /// Retries after the first registry attempt.
    pub max_retries: u32,
    /// Answer with a placeholder payload while the circuit is open.
    pub fallback_on_open: bool,
    pub circuit: CircuitBreakerConfig,
    pub ttl_days: i64,
    /// Postgres when set, in-memory store otherwise.
    pub database_url: Option<String>,
    /// Redis Streams queue when set (requires the `redis` feature).
    pub redis_url: Option<String>,
    pub queue_batch_size: usize,
    pub queue_wait: Duration,
    pub process_concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            registry: RegistryConfig::new(DEFAULT_EXTERNAL_API_URL, ""),
            max_retries: 3,
            fallback_on_open: true,
            circuit: CircuitBreakerConfig::default(),
            ttl_days: DEFAULT_TTL_DAYS,
            database_url: None,
            redis_url: None,
            queue_batch_size: 10,
            queue_wait: Duration::from_millis(1_000),
            process_concurrency: 1,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; unset or blank keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr;
        }

        match get("EXTERNAL_API_URL") {
            Some(url) => config.registry.base_url = url,
            None => warn!(default = DEFAULT_EXTERNAL_API_URL, "EXTERNAL_API_URL not set"),
        }
        match get("EXTERNAL_API_KEY") {
            Some(key) => config.registry.api_key = key,
            None => warn!("EXTERNAL_API_KEY not set; registry calls are unauthenticated"),
        }
        if let Some(ms) = parse::<u64>(&get, "EXTERNAL_API_TIMEOUT_MS")? {
            config.registry.timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse(&get, "EXTERNAL_API_MAX_RETRIES")? {
            config.max_retries = n;
        }
        if let Some(enabled) = parse_bool(&get, "EXTERNAL_API_FALLBACK")? {
            config.fallback_on_open = enabled;
        }

        if let Some(n) = parse(&get, "CIRCUIT_FAILURE_THRESHOLD")? {
            config.circuit.failure_threshold = positive("CIRCUIT_FAILURE_THRESHOLD", n)?;
        }
        if let Some(ms) = parse::<u64>(&get, "CIRCUIT_RESET_TIMEOUT_MS")? {
            config.circuit.reset_timeout = Duration::from_millis(ms);
        }

        if let Some(days) = parse(&get, "RECORD_TTL_DAYS")? {
            let days = positive("RECORD_TTL_DAYS", days)?;
            config.ttl_days = at_most("RECORD_TTL_DAYS", days, MAX_TTL_DAYS)?;
        }

        config.database_url = get("DATABASE_URL");
        config.redis_url = get("REDIS_URL");

        if let Some(n) = parse(&get, "QUEUE_BATCH_SIZE")? {
            config.queue_batch_size = positive("QUEUE_BATCH_SIZE", n)?;
        }
        if let Some(ms) = parse::<u64>(&get, "QUEUE_WAIT_MS")? {
            config.queue_wait = Duration::from_millis(ms);
        }
        if let Some(n) = parse(&get, "PROCESS_CONCURRENCY")? {
            config.process_concurrency = positive("PROCESS_CONCURRENCY", n)?;
        }

        info!(
            bind_addr = %config.bind_addr,
            registry = %config.registry.base_url,
            timeout_ms = config.registry.timeout.as_millis() as u64,
            max_retries = config.max_retries,
            fallback_on_open = config.fallback_on_open,
            failure_threshold = config.circuit.failure_threshold,
            reset_timeout_ms = config.circuit.reset_timeout.as_millis() as u64,
            ttl_days = config.ttl_days,
            postgres = config.database_url.is_some(),
            redis = config.redis_url.is_some(),
            "configuration loaded"
        );

        Ok(config)
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|value| {
            value.parse::<T>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<bool>, ConfigError> {
    get(key)
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key,
                value,
                reason: "expected a boolean".into(),
            }),
        })
        .transpose()
}

fn positive<T>(key: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + ToString,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        })
    }
}

fn at_most<T>(key: &'static str, value: T, max: T) -> Result<T, ConfigError>
where
    T: PartialOrd + ToString,
{
    if value <= max {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("must be at most {}", max.to_string()),
            value: value.to_string(),
        })
    }
}

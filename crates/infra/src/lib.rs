//! Infrastructure layer: storage, queue, external registry client, workers.

pub mod circuit_breaker;
pub mod external;
pub mod queue;
pub mod repository;
pub mod workers;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitSnapshot, CircuitState,
};

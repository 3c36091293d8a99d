//! External CNJ registry client.
//!
//! Layers, innermost first:
//! - `transport`: one HTTP request, failures classified transient/permanent
//! - `retry`: exponential backoff over transient failures
//! - `client`: the retrying call guarded by a shared circuit breaker

pub mod client;
pub mod retry;
pub mod transport;

pub use client::{HttpRegistryClient, fallback_payload};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use transport::{RegistryConfig, RegistryTransport, ReqwestTransport};

//! CNJ record storage adapters.

use async_trait::async_trait;

use cnjflow_core::RepositoryError;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryCnjRepository;
pub use postgres::PostgresCnjRepository;

/// Honours the per-record expiry hint for backends without native TTL.
#[async_trait]
pub trait RecordPurger: Send + Sync {
    /// Delete records whose `ttl` is at or before `now_epoch_secs`; returns
    /// how many were removed.
    async fn purge_expired(&self, now_epoch_secs: i64) -> Result<u64, RepositoryError>;
}

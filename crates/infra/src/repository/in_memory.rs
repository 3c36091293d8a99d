use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use cnjflow_core::{Cnj, CnjRecord, CnjRepository, RepositoryError, StatusUpdate};

use super::RecordPurger;

/// In-memory CNJ store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCnjRepository {
    inner: RwLock<HashMap<String, CnjRecord>>,
}

impl InMemoryCnjRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, CnjRecord>>, RepositoryError> {
        self.inner
            .write()
            .map_err(|_| RepositoryError::Storage("lock poisoned".into()))
    }
}

#[async_trait]
impl CnjRepository for InMemoryCnjRepository {
    async fn save(&self, cnj: &Cnj) -> Result<(), RepositoryError> {
        self.write()?
            .insert(cnj.number().to_string(), CnjRecord::from(cnj));
        Ok(())
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Cnj>, RepositoryError> {
        let map = self
            .inner
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".into()))?;
        Ok(map.get(number).cloned().map(CnjRecord::into_entity))
    }

    async fn update_status(&self, number: &str, update: StatusUpdate) -> Result<(), RepositoryError> {
        let mut map = self.write()?;
        let record = map
            .get_mut(number)
            .ok_or_else(|| RepositoryError::NotFound(number.to_string()))?;
        record.apply_status_update(update, Utc::now());
        Ok(())
    }
}

#[async_trait]
impl RecordPurger for InMemoryCnjRepository {
    async fn purge_expired(&self, now_epoch_secs: i64) -> Result<u64, RepositoryError> {
        let mut map = self.write()?;
        let before = map.len();
        map.retain(|_, record| !record.is_expired(now_epoch_secs));
        Ok((before - map.len()) as u64)
    }
}

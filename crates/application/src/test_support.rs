//! Scriptable port doubles shared by the use case tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use cnjflow_core::{
    Cnj, CnjMessage, CnjRecord, CnjRepository, CnjStatus, ExternalCnjService, ExternalError,
    ExternalPayload, MessageId, QueueError, QueueService, RepositoryError, StatusUpdate,
};

#[derive(Debug, Default)]
pub struct RecordingQueue {
    pub sent: Mutex<Vec<CnjMessage>>,
    pub fail_with: Mutex<Option<QueueError>>,
}

#[async_trait]
impl QueueService for RecordingQueue {
    async fn send(&self, message: &CnjMessage) -> Result<MessageId, QueueError> {
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(MessageId::new(format!("msg-{}", sent.len())))
    }
}

/// Repository double that keeps every saved snapshot.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    pub records: Mutex<HashMap<String, Cnj>>,
    pub saves: Mutex<Vec<Cnj>>,
    /// Saves of entities in this status fail with a storage error.
    pub fail_on_status: Mutex<Option<CnjStatus>>,
    /// Every save of this number fails with a storage error.
    pub fail_on_number: Mutex<Option<String>>,
}

impl MemoryRepository {
    pub fn failing_on(status: CnjStatus) -> Self {
        let repo = Self::default();
        *repo.fail_on_status.lock().unwrap() = Some(status);
        repo
    }

    pub fn failing_for(number: &str) -> Self {
        let repo = Self::default();
        *repo.fail_on_number.lock().unwrap() = Some(number.to_string());
        repo
    }

    pub fn stored(&self, number: &str) -> Option<Cnj> {
        self.records.lock().unwrap().get(number).cloned()
    }

    pub fn saved_statuses(&self) -> Vec<CnjStatus> {
        self.saves.lock().unwrap().iter().map(Cnj::status).collect()
    }
}

#[async_trait]
impl CnjRepository for MemoryRepository {
    async fn save(&self, cnj: &Cnj) -> Result<(), RepositoryError> {
        let number_fails = self.fail_on_number.lock().unwrap().as_deref() == Some(cnj.number());
        if number_fails || *self.fail_on_status.lock().unwrap() == Some(cnj.status()) {
            return Err(RepositoryError::Storage("database unavailable".into()));
        }
        self.saves.lock().unwrap().push(cnj.clone());
        self.records
            .lock()
            .unwrap()
            .insert(cnj.number().to_string(), cnj.clone());
        Ok(())
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Cnj>, RepositoryError> {
        Ok(self.stored(number))
    }

    async fn update_status(&self, number: &str, update: StatusUpdate) -> Result<(), RepositoryError> {
        let mut records = self.records.lock().unwrap();
        let current = records
            .get(number)
            .ok_or_else(|| RepositoryError::NotFound(number.to_string()))?;
        let mut record = CnjRecord::from(current);
        record.apply_status_update(update, Utc::now());
        records.insert(number.to_string(), record.into_entity());
        Ok(())
    }
}

/// Registry double answering from a script, then with a default payload.
#[derive(Debug, Default)]
pub struct ScriptedRegistry {
    pub script: Mutex<VecDeque<Result<ExternalPayload, ExternalError>>>,
    pub calls: AtomicUsize,
}

impl ScriptedRegistry {
    pub fn answering(results: Vec<Result<ExternalPayload, ExternalError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalCnjService for ScriptedRegistry {
    async fn fetch_cnj_data(&self, number: &str) -> Result<ExternalPayload, ExternalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(ExternalPayload::new(
                serde_json::json!({ "cnj": number, "status": "active" }),
            )),
        }
    }
}

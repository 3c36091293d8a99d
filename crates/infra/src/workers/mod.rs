//! Background workers (queue consumption, record expiry).

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub mod purge_worker;
pub mod queue_worker;

pub use purge_worker::PurgeWorker;
pub use queue_worker::{QueueWorker, QueueWorkerConfig};

/// Handle to stop and join a background worker. Dropping it also stops the
/// worker, without waiting.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub(crate) fn new(shutdown: oneshot::Sender<()>, join: JoinHandle<()>) -> Self {
        Self {
            shutdown: Some(shutdown),
            join: Some(join),
        }
    }

    /// Request graceful shutdown and wait for the worker to stop. Work already
    /// in progress runs to completion first.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

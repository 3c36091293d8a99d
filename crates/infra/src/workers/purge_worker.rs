use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::repository::RecordPurger;

use super::WorkerHandle;

/// Periodically deletes records whose expiry hint has passed.
#[derive(Debug)]
pub struct PurgeWorker;

impl PurgeWorker {
    pub fn spawn(purger: Arc<dyn RecordPurger>, every: Duration) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {}
                }

                match purger.purge_expired(Utc::now().timestamp()).await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "expired CNJ records purged"),
                    Err(err) => warn!(error = %err, "record purge failed"),
                }
            }
        });

        WorkerHandle::new(shutdown_tx, join)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryCnjRepository;
    use cnjflow_core::{Cnj, CnjNumber, CnjRepository, RequestId};

    #[tokio::test]
    async fn expired_records_are_removed_on_tick() {
        let repo = Arc::new(InMemoryCnjRepository::new());
        let mut cnj = Cnj::processing(
            CnjNumber::parse("1234567-12.1234.1.12.1234").unwrap(),
            Utc::now(),
            RequestId::new("r"),
        );
        cnj.set_ttl(-1);
        repo.save(&cnj).await.unwrap();

        let handle = PurgeWorker::spawn(repo.clone(), Duration::from_millis(10));
        for _ in 0..100 {
            if repo.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;

        assert!(repo.is_empty());
    }
}

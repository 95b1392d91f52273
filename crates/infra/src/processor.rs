//! Queue processing: claim jobs, forward to the relayer, record outcomes.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use beatschain_minting::{MintJobId, MintOutcome};

use crate::relayer::RelayerClient;
use crate::store::{MintJobStore, StoreError};

/// Outcome of one processed job, as reported to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedJob {
    pub id: MintJobId,
    #[serde(flatten)]
    pub outcome: MintOutcome,
}

/// Claims queued mint jobs and drives each one to a terminal status.
///
/// Single-attempt: a failed forward marks the job `failed` and moves on.
pub struct QueueProcessor {
    jobs: Arc<dyn MintJobStore>,
    relayer: Arc<dyn RelayerClient>,
}

impl QueueProcessor {
    pub fn new(jobs: Arc<dyn MintJobStore>, relayer: Arc<dyn RelayerClient>) -> Self {
        Self { jobs, relayer }
    }

    /// Claim up to `limit` jobs for `worker_id` and process them in order.
    pub async fn process(
        &self,
        worker_id: &str,
        limit: usize,
    ) -> Result<Vec<ProcessedJob>, StoreError> {
        let claimed = self.jobs.claim(worker_id, limit).await?;
        if claimed.is_empty() {
            return Ok(Vec::new());
        }
        info!(worker_id, count = claimed.len(), "processing claimed mint jobs");

        let mut processed = Vec::with_capacity(claimed.len());
        for job in claimed {
            let outcome = match self.relayer.forward_mint(&job).await {
                Ok(receipt) => MintOutcome::Forwarded { receipt },
                Err(e) => {
                    warn!(job_id = %job.id, "relayer forward failed: {e}");
                    MintOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            self.jobs.mark_result(job.id, outcome.clone()).await?;
            processed.push(ProcessedJob {
                id: job.id,
                outcome,
            });
        }
        Ok(processed)
    }
}

/// Background poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Fixed delay between polls.
    pub interval: Duration,
    /// Jobs claimed per poll.
    pub batch_size: usize,
    /// Worker id stamped on claimed jobs.
    pub worker_id: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_size: 10,
            worker_id: "poller".to_string(),
        }
    }
}

/// Spawn a fixed-interval polling loop over the processor.
///
/// Errors are logged and the loop keeps going; aborting the returned handle
/// stops it.
pub fn spawn_poller(
    processor: Arc<QueueProcessor>,
    config: PollerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            worker_id = %config.worker_id,
            interval_secs = config.interval.as_secs(),
            "mint queue poller started"
        );
        loop {
            tokio::time::sleep(config.interval).await;
            match processor.process(&config.worker_id, config.batch_size).await {
                Ok(processed) if !processed.is_empty() => {
                    info!(count = processed.len(), "poller processed mint jobs");
                }
                Ok(_) => {}
                Err(e) => warn!("poller pass failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relayer::RelayerError;
    use crate::store::file::FileMintJobStore;
    use async_trait::async_trait;
    use beatschain_core::Wallet;
    use beatschain_minting::{MintJob, MintJobStatus, MintRequest, RelayReceipt};

    struct StubRelayer {
        fail: bool,
    }

    #[async_trait]
    impl RelayerClient for StubRelayer {
        async fn forward_mint(&self, job: &MintJob) -> Result<RelayReceipt, RelayerError> {
            if self.fail {
                Err(RelayerError::Rejected {
                    status: 503,
                    message: "relayer down".to_string(),
                })
            } else {
                Ok(RelayReceipt {
                    queue_id: format!("q-{}", job.id),
                    transaction_hash: None,
                })
            }
        }
    }

    fn request() -> MintRequest {
        MintRequest {
            to: Wallet::new("0x00000000000000000000000000000000000000dd").unwrap(),
            metadata_uri: "ipfs://bafy/meta.json".to_string(),
            metadata: serde_json::json!({"name": "Track"}),
            client_id: "storefront".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_forward_marks_jobs_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<FileMintJobStore> = Arc::new(FileMintJobStore::new(dir.path()).unwrap());

        let job = MintJob::new(request());
        let id = job.id;
        store.enqueue(&job).await.unwrap();

        let processor = QueueProcessor::new(store.clone(), Arc::new(StubRelayer { fail: false }));
        let processed = processor.process("worker-1", 10).await.unwrap();

        assert_eq!(processed.len(), 1);
        assert!(matches!(
            processed[0].outcome,
            MintOutcome::Forwarded { .. }
        ));

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, MintJobStatus::Forwarded);
        assert_eq!(job.processing_by.as_deref(), Some("worker-1"));
    }

    #[tokio::test]
    async fn failed_forward_marks_job_failed_and_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<FileMintJobStore> = Arc::new(FileMintJobStore::new(dir.path()).unwrap());

        let job = MintJob::new(request());
        let id = job.id;
        store.enqueue(&job).await.unwrap();

        let processor = QueueProcessor::new(store.clone(), Arc::new(StubRelayer { fail: true }));
        let processed = processor.process("worker-1", 10).await.unwrap();

        assert_eq!(processed.len(), 1);
        assert!(matches!(processed[0].outcome, MintOutcome::Failed { .. }));

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, MintJobStatus::Failed);

        // Failed jobs are terminal: nothing left to claim or list.
        assert!(store.list_pending(10).await.unwrap().is_empty());
        assert!(processor.process("worker-2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<FileMintJobStore> = Arc::new(FileMintJobStore::new(dir.path()).unwrap());
        let processor = QueueProcessor::new(store, Arc::new(StubRelayer { fail: false }));

        assert!(processor.process("worker-1", 10).await.unwrap().is_empty());
    }
}

//! Primary/fallback store composition.
//!
//! Wraps a preferred (remote) store and a local file store behind the same
//! trait. Infrastructure failures on the primary degrade to the fallback and
//! log a warning; semantic results (`NotFound`, `Conflict`) pass through
//! untouched so degradation never changes meaning.
//!
//! The two stores are NOT reconciled: writes served by the fallback stay
//! local until an operator merges them. That silent-divergence risk is
//! accepted for this service tier.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use beatschain_campaigns::Campaign;
use beatschain_core::{CampaignId, UserId, Wallet};
use beatschain_credits::CreditEntry;
use beatschain_isrc::{DesignationRange, IsrcRecord};
use beatschain_minting::{MintJob, MintJobId, MintOutcome};

use super::{CampaignStore, CreditStore, IsrcStore, MintJobStore, StoreError};

fn should_degrade(e: &StoreError) -> bool {
    e.is_infrastructure()
}

/// ISRC store that prefers `primary` and degrades to `fallback`.
pub struct FallbackIsrcStore {
    primary: Arc<dyn IsrcStore>,
    fallback: Arc<dyn IsrcStore>,
}

impl FallbackIsrcStore {
    pub fn new(primary: Arc<dyn IsrcStore>, fallback: Arc<dyn IsrcStore>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl IsrcStore for FallbackIsrcStore {
    async fn highest_designation(
        &self,
        range: DesignationRange,
        year: u8,
    ) -> Result<Option<u32>, StoreError> {
        match self.primary.highest_designation(range, year).await {
            Err(e) if should_degrade(&e) => {
                warn!("isrc store degraded to file fallback: {e}");
                self.fallback.highest_designation(range, year).await
            }
            other => other,
        }
    }

    async fn insert_record(&self, record: &IsrcRecord) -> Result<(), StoreError> {
        match self.primary.insert_record(record).await {
            Err(e) if should_degrade(&e) => {
                warn!("isrc store degraded to file fallback: {e}");
                self.fallback.insert_record(record).await
            }
            other => other,
        }
    }

    async fn records_for_user(&self, user_id: &UserId) -> Result<Vec<IsrcRecord>, StoreError> {
        match self.primary.records_for_user(user_id).await {
            Err(e) if should_degrade(&e) => {
                warn!("isrc store degraded to file fallback: {e}");
                self.fallback.records_for_user(user_id).await
            }
            other => other,
        }
    }
}

/// Credit store that prefers `primary` and degrades to `fallback`.
pub struct FallbackCreditStore {
    primary: Arc<dyn CreditStore>,
    fallback: Arc<dyn CreditStore>,
}

impl FallbackCreditStore {
    pub fn new(primary: Arc<dyn CreditStore>, fallback: Arc<dyn CreditStore>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl CreditStore for FallbackCreditStore {
    async fn append(&self, entry: &CreditEntry) -> Result<(), StoreError> {
        match self.primary.append(entry).await {
            Err(e) if should_degrade(&e) => {
                warn!("credit store degraded to file fallback: {e}");
                self.fallback.append(entry).await
            }
            other => other,
        }
    }

    async fn entries_for_wallet(
        &self,
        wallet: &Wallet,
        limit: usize,
    ) -> Result<Vec<CreditEntry>, StoreError> {
        match self.primary.entries_for_wallet(wallet, limit).await {
            Err(e) if should_degrade(&e) => {
                warn!("credit store degraded to file fallback: {e}");
                self.fallback.entries_for_wallet(wallet, limit).await
            }
            other => other,
        }
    }

    async fn balance(&self, wallet: &Wallet) -> Result<i64, StoreError> {
        match self.primary.balance(wallet).await {
            Err(e) if should_degrade(&e) => {
                warn!("credit store degraded to file fallback: {e}");
                self.fallback.balance(wallet).await
            }
            other => other,
        }
    }
}

/// Campaign store that prefers `primary` and degrades to `fallback`.
pub struct FallbackCampaignStore {
    primary: Arc<dyn CampaignStore>,
    fallback: Arc<dyn CampaignStore>,
}

impl FallbackCampaignStore {
    pub fn new(primary: Arc<dyn CampaignStore>, fallback: Arc<dyn CampaignStore>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl CampaignStore for FallbackCampaignStore {
    async fn insert(&self, campaign: &Campaign) -> Result<(), StoreError> {
        match self.primary.insert(campaign).await {
            Err(e) if should_degrade(&e) => {
                warn!("campaign store degraded to file fallback: {e}");
                self.fallback.insert(campaign).await
            }
            other => other,
        }
    }

    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError> {
        match self.primary.get(id).await {
            Err(e) if should_degrade(&e) => {
                warn!("campaign store degraded to file fallback: {e}");
                self.fallback.get(id).await
            }
            other => other,
        }
    }

    async fn reserve(&self, id: CampaignId, amount: i64) -> Result<bool, StoreError> {
        match self.primary.reserve(id, amount).await {
            Err(e) if should_degrade(&e) => {
                warn!("campaign store degraded to file fallback: {e}");
                self.fallback.reserve(id, amount).await
            }
            other => other,
        }
    }

    async fn add_funds(&self, id: CampaignId, amount: i64) -> Result<(), StoreError> {
        match self.primary.add_funds(id, amount).await {
            Err(e) if should_degrade(&e) => {
                warn!("campaign store degraded to file fallback: {e}");
                self.fallback.add_funds(id, amount).await
            }
            other => other,
        }
    }

    async fn refund(&self, id: CampaignId, amount: i64) -> Result<(), StoreError> {
        match self.primary.refund(id, amount).await {
            Err(e) if should_degrade(&e) => {
                warn!("campaign store degraded to file fallback: {e}");
                self.fallback.refund(id, amount).await
            }
            other => other,
        }
    }
}

/// Mint job store that prefers `primary` and degrades to `fallback`.
pub struct FallbackMintJobStore {
    primary: Arc<dyn MintJobStore>,
    fallback: Arc<dyn MintJobStore>,
}

impl FallbackMintJobStore {
    pub fn new(primary: Arc<dyn MintJobStore>, fallback: Arc<dyn MintJobStore>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl MintJobStore for FallbackMintJobStore {
    async fn enqueue(&self, job: &MintJob) -> Result<(), StoreError> {
        match self.primary.enqueue(job).await {
            Err(e) if should_degrade(&e) => {
                warn!("mint job store degraded to file fallback: {e}");
                self.fallback.enqueue(job).await
            }
            other => other,
        }
    }

    async fn get(&self, id: MintJobId) -> Result<Option<MintJob>, StoreError> {
        match self.primary.get(id).await {
            Err(e) if should_degrade(&e) => {
                warn!("mint job store degraded to file fallback: {e}");
                self.fallback.get(id).await
            }
            other => other,
        }
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<MintJob>, StoreError> {
        match self.primary.list_pending(limit).await {
            Err(e) if should_degrade(&e) => {
                warn!("mint job store degraded to file fallback: {e}");
                self.fallback.list_pending(limit).await
            }
            other => other,
        }
    }

    async fn claim(&self, worker_id: &str, limit: usize) -> Result<Vec<MintJob>, StoreError> {
        match self.primary.claim(worker_id, limit).await {
            Err(e) if should_degrade(&e) => {
                warn!("mint job store degraded to file fallback: {e}");
                self.fallback.claim(worker_id, limit).await
            }
            other => other,
        }
    }

    async fn mark_result(&self, id: MintJobId, outcome: MintOutcome) -> Result<(), StoreError> {
        match self.primary.mark_result(id, outcome.clone()).await {
            Err(e) if should_degrade(&e) => {
                warn!("mint job store degraded to file fallback: {e}");
                self.fallback.mark_result(id, outcome).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::file::{FileCreditStore, FileMintJobStore};
    use beatschain_minting::MintRequest;

    /// Primary that always fails with an infrastructure error.
    struct DownCreditStore;

    #[async_trait]
    impl CreditStore for DownCreditStore {
        async fn append(&self, _entry: &CreditEntry) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn entries_for_wallet(
            &self,
            _wallet: &Wallet,
            _limit: usize,
        ) -> Result<Vec<CreditEntry>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn balance(&self, _wallet: &Wallet) -> Result<i64, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    /// Primary whose claim is healthy but empty; used to check that semantic
    /// results do not trigger degradation.
    struct EmptyMintJobStore;

    #[async_trait]
    impl MintJobStore for EmptyMintJobStore {
        async fn enqueue(&self, _job: &MintJob) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get(&self, _id: MintJobId) -> Result<Option<MintJob>, StoreError> {
            Ok(None)
        }

        async fn list_pending(&self, _limit: usize) -> Result<Vec<MintJob>, StoreError> {
            Ok(Vec::new())
        }

        async fn claim(&self, _worker_id: &str, _limit: usize) -> Result<Vec<MintJob>, StoreError> {
            Ok(Vec::new())
        }

        async fn mark_result(
            &self,
            _id: MintJobId,
            _outcome: MintOutcome,
        ) -> Result<(), StoreError> {
            Err(StoreError::NotFound)
        }
    }

    fn wallet() -> Wallet {
        Wallet::new("0x00000000000000000000000000000000000000cc").unwrap()
    }

    #[tokio::test]
    async fn infrastructure_failure_degrades_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FallbackCreditStore::new(
            Arc::new(DownCreditStore),
            Arc::new(FileCreditStore::new(dir.path()).unwrap()),
        );

        let entry = CreditEntry::new(wallet(), 10, "purchase", serde_json::Value::Null).unwrap();
        store.append(&entry).await.unwrap();

        assert_eq!(store.balance(&wallet()).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn semantic_errors_pass_through_without_degrading() {
        let dir = tempfile::tempdir().unwrap();
        let file = Arc::new(FileMintJobStore::new(dir.path()).unwrap());

        // Seed a job into the *fallback* store only.
        let job = MintJob::new(MintRequest {
            to: wallet(),
            metadata_uri: "ipfs://x".to_string(),
            metadata: serde_json::Value::Null,
            client_id: "c".to_string(),
        });
        file.enqueue(&job).await.unwrap();

        let store = FallbackMintJobStore::new(Arc::new(EmptyMintJobStore), file);

        // Primary's NotFound is returned as-is; the fallback is never asked.
        let err = store
            .mark_result(
                job.id,
                MintOutcome::Failed {
                    reason: "x".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        // Same for healthy-but-empty reads.
        assert!(store.list_pending(10).await.unwrap().is_empty());
    }
}

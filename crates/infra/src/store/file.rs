//! Local JSON file stores.
//!
//! Fallback persistence used when no database is configured or the remote
//! store is failing. One JSON document per subsystem, guarded by an
//! in-process lock; concurrent writer *processes* are not supported, which
//! matches the degraded mode this exists for.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use beatschain_campaigns::Campaign;
use beatschain_core::{CampaignId, UserId, Wallet};
use beatschain_credits::{balance_of, CreditEntry};
use beatschain_isrc::{DesignationRange, IsrcRecord};
use beatschain_minting::{MintJob, MintJobId, MintOutcome};

use super::{CampaignStore, CreditStore, IsrcStore, MintJobStore, StoreError};

async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// JSON file store for issued ISRC codes.
#[derive(Debug)]
pub struct FileIsrcStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileIsrcStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = data_dir.as_ref().join("isrc_codes.json");
        ensure_dir(&path)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl IsrcStore for FileIsrcStore {
    async fn highest_designation(
        &self,
        range: DesignationRange,
        year: u8,
    ) -> Result<Option<u32>, StoreError> {
        let _guard = self.lock.lock().await;
        let records: Vec<IsrcRecord> = read_json(&self.path).await?;
        Ok(records
            .iter()
            .map(|r| &r.isrc)
            .filter(|code| code.year() == year && range.contains(code.designation()))
            .map(|code| code.designation())
            .max())
    }

    async fn insert_record(&self, record: &IsrcRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut records: Vec<IsrcRecord> = read_json(&self.path).await?;
        if records.iter().any(|r| r.isrc == record.isrc) {
            return Err(StoreError::Conflict(format!(
                "isrc already issued: {}",
                record.isrc
            )));
        }
        records.push(record.clone());
        write_json(&self.path, &records).await
    }

    async fn records_for_user(&self, user_id: &UserId) -> Result<Vec<IsrcRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let records: Vec<IsrcRecord> = read_json(&self.path).await?;
        Ok(records
            .into_iter()
            .filter(|r| &r.user_id == user_id)
            .collect())
    }
}

/// JSON file store for the credit ledger.
#[derive(Debug)]
pub struct FileCreditStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCreditStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = data_dir.as_ref().join("credit_ledger.json");
        ensure_dir(&path)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl CreditStore for FileCreditStore {
    async fn append(&self, entry: &CreditEntry) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries: Vec<CreditEntry> = read_json(&self.path).await?;
        entries.push(entry.clone());
        write_json(&self.path, &entries).await
    }

    async fn entries_for_wallet(
        &self,
        wallet: &Wallet,
        limit: usize,
    ) -> Result<Vec<CreditEntry>, StoreError> {
        let _guard = self.lock.lock().await;
        let entries: Vec<CreditEntry> = read_json(&self.path).await?;
        let mut mine: Vec<CreditEntry> = entries
            .into_iter()
            .filter(|e| &e.wallet == wallet)
            .collect();
        // Appended chronologically; history reads newest first.
        mine.reverse();
        mine.truncate(limit);
        Ok(mine)
    }

    async fn balance(&self, wallet: &Wallet) -> Result<i64, StoreError> {
        let _guard = self.lock.lock().await;
        let entries: Vec<CreditEntry> = read_json(&self.path).await?;
        Ok(balance_of(wallet, &entries))
    }
}

/// JSON file store for campaigns.
#[derive(Debug)]
pub struct FileCampaignStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCampaignStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = data_dir.as_ref().join("campaigns.json");
        ensure_dir(&path)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    async fn update<F>(&self, id: CampaignId, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Campaign) -> Result<(), StoreError>,
    {
        let _guard = self.lock.lock().await;
        let mut campaigns: Vec<Campaign> = read_json(&self.path).await?;
        let campaign = campaigns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound)?;
        f(campaign)?;
        write_json(&self.path, &campaigns).await
    }
}

#[async_trait]
impl CampaignStore for FileCampaignStore {
    async fn insert(&self, campaign: &Campaign) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut campaigns: Vec<Campaign> = read_json(&self.path).await?;
        if campaigns.iter().any(|c| c.id == campaign.id) {
            return Err(StoreError::Conflict(format!(
                "campaign already exists: {}",
                campaign.id
            )));
        }
        campaigns.push(campaign.clone());
        write_json(&self.path, &campaigns).await
    }

    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError> {
        let _guard = self.lock.lock().await;
        let campaigns: Vec<Campaign> = read_json(&self.path).await?;
        Ok(campaigns.into_iter().find(|c| c.id == id))
    }

    async fn reserve(&self, id: CampaignId, amount: i64) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut campaigns: Vec<Campaign> = read_json(&self.path).await?;
        let campaign = campaigns
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound)?;
        if !campaign.active {
            return Ok(false);
        }
        match campaign.reserve(amount) {
            Ok(true) => {
                write_json(&self.path, &campaigns).await?;
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => Err(StoreError::Conflict(e.to_string())),
        }
    }

    async fn add_funds(&self, id: CampaignId, amount: i64) -> Result<(), StoreError> {
        self.update(id, |c| {
            c.add_funds(amount)
                .map_err(|e| StoreError::Conflict(e.to_string()))
        })
        .await
    }

    async fn refund(&self, id: CampaignId, amount: i64) -> Result<(), StoreError> {
        self.update(id, |c| {
            c.refund(amount)
                .map_err(|e| StoreError::Conflict(e.to_string()))
        })
        .await
    }
}

/// JSON file store for the mint job queue.
#[derive(Debug)]
pub struct FileMintJobStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileMintJobStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = data_dir.as_ref().join("mint_jobs.json");
        ensure_dir(&path)?;
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl MintJobStore for FileMintJobStore {
    async fn enqueue(&self, job: &MintJob) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut jobs: Vec<MintJob> = read_json(&self.path).await?;
        if jobs.iter().any(|j| j.id == job.id) {
            return Err(StoreError::Conflict(format!("job already queued: {}", job.id)));
        }
        jobs.push(job.clone());
        write_json(&self.path, &jobs).await
    }

    async fn get(&self, id: MintJobId) -> Result<Option<MintJob>, StoreError> {
        let _guard = self.lock.lock().await;
        let jobs: Vec<MintJob> = read_json(&self.path).await?;
        Ok(jobs.into_iter().find(|j| j.id == id))
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<MintJob>, StoreError> {
        let _guard = self.lock.lock().await;
        let jobs: Vec<MintJob> = read_json(&self.path).await?;
        let mut pending: Vec<MintJob> = jobs.into_iter().filter(|j| j.is_pending()).collect();
        pending.sort_by_key(|j| j.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn claim(&self, worker_id: &str, limit: usize) -> Result<Vec<MintJob>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut jobs: Vec<MintJob> = read_json(&self.path).await?;
        jobs.sort_by_key(|j| j.created_at);

        let mut claimed = Vec::new();
        for job in jobs.iter_mut() {
            if claimed.len() >= limit {
                break;
            }
            if job.is_pending() {
                job.mark_processing(worker_id);
                claimed.push(job.clone());
            }
        }

        if !claimed.is_empty() {
            write_json(&self.path, &jobs).await?;
        }
        Ok(claimed)
    }

    async fn mark_result(&self, id: MintJobId, outcome: MintOutcome) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut jobs: Vec<MintJob> = read_json(&self.path).await?;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(StoreError::NotFound)?;
        match outcome {
            MintOutcome::Forwarded { receipt } => job.mark_forwarded(receipt),
            MintOutcome::Failed { reason } => job.mark_failed(reason),
        }
        write_json(&self.path, &jobs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatschain_isrc::{allocate, designation_range_for, Isrc};
    use beatschain_minting::{MintRequest, RelayReceipt};

    fn wallet(n: u8) -> Wallet {
        Wallet::new(format!("0x{:040x}", n)).unwrap()
    }

    fn mint_request() -> MintRequest {
        MintRequest {
            to: wallet(7),
            metadata_uri: "ipfs://bafy/track.json".to_string(),
            metadata: serde_json::json!({"name": "Track"}),
            client_id: "storefront".to_string(),
        }
    }

    #[tokio::test]
    async fn isrc_store_tracks_highest_designation() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIsrcStore::new(dir.path()).unwrap();

        let user = UserId::new("artist-1").unwrap();
        let range = designation_range_for(&user);

        assert_eq!(store.highest_designation(range, 26).await.unwrap(), None);

        let code = allocate(&user, 26, None).unwrap();
        let record = IsrcRecord::new(code.clone(), "Song", "Artist", user.clone()).unwrap();
        store.insert_record(&record).await.unwrap();

        assert_eq!(
            store.highest_designation(range, 26).await.unwrap(),
            Some(code.designation())
        );
        // A different year starts fresh.
        assert_eq!(store.highest_designation(range, 27).await.unwrap(), None);
    }

    #[tokio::test]
    async fn isrc_store_rejects_duplicate_codes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIsrcStore::new(dir.path()).unwrap();

        let user = UserId::new("artist-1").unwrap();
        let code = Isrc::new(26, 200).unwrap();
        let record = IsrcRecord::new(code, "Song", "Artist", user).unwrap();

        store.insert_record(&record).await.unwrap();
        let err = store.insert_record(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn stores_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = FileCreditStore::new(dir.path()).unwrap();
            let entry =
                CreditEntry::new(wallet(1), 25, "purchase", serde_json::Value::Null).unwrap();
            store.append(&entry).await.unwrap();
        }

        // A fresh instance over the same directory sees the data.
        let store = FileCreditStore::new(dir.path()).unwrap();
        assert_eq!(store.balance(&wallet(1)).await.unwrap(), 25);
    }

    #[tokio::test]
    async fn credit_history_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCreditStore::new(dir.path()).unwrap();
        let w = wallet(1);

        for delta in [10, -2, 5] {
            let entry = CreditEntry::new(w.clone(), delta, "t", serde_json::Value::Null).unwrap();
            store.append(&entry).await.unwrap();
        }

        let history = store.entries_for_wallet(&w, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].delta, 5);
        assert_eq!(history[1].delta, -2);
        assert_eq!(store.balance(&w).await.unwrap(), 13);
    }

    #[tokio::test]
    async fn campaign_reserve_and_refund() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCampaignStore::new(dir.path()).unwrap();

        let campaign = Campaign::new("drop", wallet(3), 100).unwrap();
        let id = campaign.id;
        store.insert(&campaign).await.unwrap();

        assert!(store.reserve(id, 60).await.unwrap());
        assert!(!store.reserve(id, 60).await.unwrap());
        assert_eq!(store.get(id).await.unwrap().unwrap().remaining, 40);

        store.refund(id, 60).await.unwrap();
        assert_eq!(store.get(id).await.unwrap().unwrap().remaining, 100);

        assert!(matches!(
            store.reserve(CampaignId::new(), 1).await.unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn queue_claim_removes_from_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMintJobStore::new(dir.path()).unwrap();

        let job = MintJob::new(mint_request());
        let id = job.id;
        store.enqueue(&job).await.unwrap();

        let pending = store.list_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);

        let claimed = store.claim("worker-1", 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].processing_by.as_deref(), Some("worker-1"));

        assert!(store.list_pending(10).await.unwrap().is_empty());
        assert!(store.claim("worker-2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_result_finishes_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMintJobStore::new(dir.path()).unwrap();

        let job = MintJob::new(mint_request());
        let id = job.id;
        store.enqueue(&job).await.unwrap();
        store.claim("worker-1", 1).await.unwrap();

        store
            .mark_result(
                id,
                MintOutcome::Forwarded {
                    receipt: RelayReceipt {
                        queue_id: "q-1".to_string(),
                        transaction_hash: None,
                    },
                },
            )
            .await
            .unwrap();

        let job = store.get(id).await.unwrap().unwrap();
        assert!(job.status.is_terminal());
        assert!(store.list_pending(10).await.unwrap().is_empty());
    }
}

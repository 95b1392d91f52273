//! Store abstractions and error model.
//!
//! Every subsystem persists through a small async trait with two
//! implementations: a Postgres row store (preferred) and a local JSON file
//! store with the same schema (fallback). The `fallback` module composes the
//! two so persistence failures degrade instead of failing the request.

pub mod fallback;
pub mod file;
pub mod postgres;

use async_trait::async_trait;

use beatschain_campaigns::Campaign;
use beatschain_core::{CampaignId, UserId, Wallet};
use beatschain_credits::CreditEntry;
use beatschain_isrc::{DesignationRange, IsrcRecord};
use beatschain_minting::{MintJob, MintJobId, MintOutcome};

/// Store-layer error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Infrastructure failures justify degrading to the fallback store;
    /// semantic outcomes (`NotFound`, `Conflict`) must not.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            StoreError::Io(_) | StoreError::Database(_) | StoreError::Unavailable(_)
        )
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Persistence for issued ISRC codes.
#[async_trait]
pub trait IsrcStore: Send + Sync {
    /// Highest designation already issued in `range` for the two-digit
    /// code `year`, or `None` when the range is untouched that year.
    async fn highest_designation(
        &self,
        range: DesignationRange,
        year: u8,
    ) -> Result<Option<u32>, StoreError>;

    /// Persist a freshly issued code. Duplicate codes are a `Conflict`.
    async fn insert_record(&self, record: &IsrcRecord) -> Result<(), StoreError>;

    /// All codes issued to a user, oldest first.
    async fn records_for_user(&self, user_id: &UserId) -> Result<Vec<IsrcRecord>, StoreError>;
}

/// Persistence for the append-only credit ledger.
#[async_trait]
pub trait CreditStore: Send + Sync {
    async fn append(&self, entry: &CreditEntry) -> Result<(), StoreError>;

    /// Entries for a wallet, newest first, at most `limit`.
    async fn entries_for_wallet(
        &self,
        wallet: &Wallet,
        limit: usize,
    ) -> Result<Vec<CreditEntry>, StoreError>;

    /// Sum of all deltas for a wallet.
    async fn balance(&self, wallet: &Wallet) -> Result<i64, StoreError>;
}

/// Persistence for campaigns and their budget arithmetic.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert(&self, campaign: &Campaign) -> Result<(), StoreError>;

    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError>;

    /// Atomically reserve `amount` from the remaining budget.
    ///
    /// Returns `Ok(false)` when the campaign is inactive or short on funds;
    /// state is untouched in that case.
    async fn reserve(&self, id: CampaignId, amount: i64) -> Result<bool, StoreError>;

    async fn add_funds(&self, id: CampaignId, amount: i64) -> Result<(), StoreError>;

    /// Return a previously reserved amount to the remaining budget.
    async fn refund(&self, id: CampaignId, amount: i64) -> Result<(), StoreError>;
}

/// Persistence for the gasless-mint job queue.
#[async_trait]
pub trait MintJobStore: Send + Sync {
    async fn enqueue(&self, job: &MintJob) -> Result<(), StoreError>;

    async fn get(&self, id: MintJobId) -> Result<Option<MintJob>, StoreError>;

    /// Queued jobs, oldest first, at most `limit`.
    async fn list_pending(&self, limit: usize) -> Result<Vec<MintJob>, StoreError>;

    /// Claim up to `limit` queued jobs for `worker_id`, oldest first.
    /// Claimed jobs move to `processing` with `processing_by` stamped.
    async fn claim(&self, worker_id: &str, limit: usize) -> Result<Vec<MintJob>, StoreError>;

    /// Record the terminal outcome of a claimed job.
    async fn mark_result(&self, id: MintJobId, outcome: MintOutcome) -> Result<(), StoreError>;
}

//! Postgres-backed stores.
//!
//! One row table per subsystem. Budget arithmetic and queue claims rely on
//! single-statement conditional updates so correctness does not depend on
//! application-side locking.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate ISRC / job id / campaign id |
//! | Database (check constraint violation) | `23514` | `Conflict` | Budget arithmetic went negative |
//! | Database (other) | Any other | `Database` | Other database errors |
//! | PoolClosed / PoolTimedOut | N/A | `Unavailable` | Connection pool unusable |
//! | Other | N/A | `Database` | Network errors, connection failures, etc. |

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use beatschain_campaigns::Campaign;
use beatschain_core::{CampaignId, UserId, Wallet};
use beatschain_credits::CreditEntry;
use beatschain_isrc::{DesignationRange, Isrc, IsrcRecord};
use beatschain_minting::{MintJob, MintJobId, MintJobStatus, MintOutcome, MintRequest};

use super::{CampaignStore, CreditStore, IsrcStore, MintJobStore, StoreError};
use async_trait::async_trait;

/// All four row stores over one connection pool.
///
/// Cheap to clone; `Arc<PostgresStores>` coerces to each store trait object.
#[derive(Debug, Clone)]
pub struct PostgresStores {
    pool: Arc<PgPool>,
}

impl PostgresStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS isrc_codes (
                isrc         TEXT PRIMARY KEY,
                track_title  TEXT NOT NULL,
                artist_name  TEXT NOT NULL,
                user_id      TEXT NOT NULL,
                year         SMALLINT NOT NULL,
                designation  INTEGER NOT NULL,
                generated_at TIMESTAMPTZ NOT NULL,
                used         BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credit_ledger (
                id         BIGSERIAL PRIMARY KEY,
                wallet     TEXT NOT NULL,
                delta      BIGINT NOT NULL,
                reason     TEXT NOT NULL,
                meta       JSONB NOT NULL DEFAULT 'null'::jsonb,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS campaigns (
                id         UUID PRIMARY KEY,
                name       TEXT NOT NULL,
                owner      TEXT NOT NULL,
                budget     BIGINT NOT NULL,
                remaining  BIGINT NOT NULL,
                active     BOOLEAN NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                CHECK (remaining >= 0 AND remaining <= budget)
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mint_jobs (
                id            UUID PRIMARY KEY,
                created_at    TIMESTAMPTZ NOT NULL,
                to_wallet     TEXT NOT NULL,
                metadata_uri  TEXT NOT NULL,
                metadata      JSONB NOT NULL,
                client_id     TEXT NOT NULL,
                status        TEXT NOT NULL,
                processing_by TEXT NULL,
                result        JSONB NULL,
                updated_at    TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        Ok(())
    }
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => StoreError::Conflict(format!("{operation}: {}", db.message())),
            Some("23514") => StoreError::Conflict(format!("{operation}: {}", db.message())),
            _ => StoreError::Database(format!("{operation}: {}", db.message())),
        },
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("{operation}: {e}"))
        }
        _ => StoreError::Database(format!("{operation}: {e}")),
    }
}

fn invalid_row(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization(format!("{context}: {e}"))
}

#[derive(Debug)]
struct IsrcRow {
    isrc: String,
    track_title: String,
    artist_name: String,
    user_id: String,
    generated_at: DateTime<Utc>,
    used: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for IsrcRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(IsrcRow {
            isrc: row.try_get("isrc")?,
            track_title: row.try_get("track_title")?,
            artist_name: row.try_get("artist_name")?,
            user_id: row.try_get("user_id")?,
            generated_at: row.try_get("generated_at")?,
            used: row.try_get("used")?,
        })
    }
}

impl IsrcRow {
    fn into_record(self) -> Result<IsrcRecord, StoreError> {
        let isrc: Isrc = self
            .isrc
            .parse()
            .map_err(|e| invalid_row("isrc_codes.isrc", e))?;
        let user_id =
            UserId::new(self.user_id).map_err(|e| invalid_row("isrc_codes.user_id", e))?;
        Ok(IsrcRecord {
            isrc,
            track_title: self.track_title,
            artist_name: self.artist_name,
            user_id,
            generated_at: self.generated_at,
            used: self.used,
        })
    }
}

#[async_trait]
impl IsrcStore for PostgresStores {
    #[instrument(skip(self), err)]
    async fn highest_designation(
        &self,
        range: DesignationRange,
        year: u8,
    ) -> Result<Option<u32>, StoreError> {
        let max: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT MAX(designation)
            FROM isrc_codes
            WHERE year = $1 AND designation BETWEEN $2 AND $3
            "#,
        )
        .bind(i16::from(year))
        .bind(range.start() as i32)
        .bind(range.end() as i32)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("highest_designation", e))?;

        Ok(max.map(|d| d as u32))
    }

    #[instrument(skip(self, record), fields(isrc = %record.isrc), err)]
    async fn insert_record(&self, record: &IsrcRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO isrc_codes
                (isrc, track_title, artist_name, user_id, year, designation, generated_at, used)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.isrc.to_string())
        .bind(&record.track_title)
        .bind(&record.artist_name)
        .bind(record.user_id.as_str())
        .bind(i16::from(record.isrc.year()))
        .bind(record.isrc.designation() as i32)
        .bind(record.generated_at)
        .bind(record.used)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_record", e))?;

        Ok(())
    }

    async fn records_for_user(&self, user_id: &UserId) -> Result<Vec<IsrcRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT isrc, track_title, artist_name, user_id, generated_at, used
            FROM isrc_codes
            WHERE user_id = $1
            ORDER BY generated_at ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("records_for_user", e))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let row = IsrcRow::from_row(&row).map_err(|e| invalid_row("isrc_codes", e))?;
            records.push(row.into_record()?);
        }
        Ok(records)
    }
}

#[derive(Debug)]
struct CreditRow {
    wallet: String,
    delta: i64,
    reason: String,
    meta: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for CreditRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(CreditRow {
            wallet: row.try_get("wallet")?,
            delta: row.try_get("delta")?,
            reason: row.try_get("reason")?,
            meta: row.try_get("meta")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl CreditRow {
    fn into_entry(self) -> Result<CreditEntry, StoreError> {
        let wallet = Wallet::new(self.wallet).map_err(|e| invalid_row("credit_ledger.wallet", e))?;
        Ok(CreditEntry {
            wallet,
            delta: self.delta,
            reason: self.reason,
            meta: self.meta,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl CreditStore for PostgresStores {
    #[instrument(skip(self, entry), fields(wallet = %entry.wallet, delta = entry.delta), err)]
    async fn append(&self, entry: &CreditEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO credit_ledger (wallet, delta, reason, meta, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.wallet.as_str())
        .bind(entry.delta)
        .bind(&entry.reason)
        .bind(&entry.meta)
        .bind(entry.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append", e))?;

        Ok(())
    }

    async fn entries_for_wallet(
        &self,
        wallet: &Wallet,
        limit: usize,
    ) -> Result<Vec<CreditEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT wallet, delta, reason, meta, created_at
            FROM credit_ledger
            WHERE wallet = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(wallet.as_str())
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("entries_for_wallet", e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let row = CreditRow::from_row(&row).map_err(|e| invalid_row("credit_ledger", e))?;
            entries.push(row.into_entry()?);
        }
        Ok(entries)
    }

    async fn balance(&self, wallet: &Wallet) -> Result<i64, StoreError> {
        let balance: i64 = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(delta), 0)::BIGINT FROM credit_ledger WHERE wallet = $1"#,
        )
        .bind(wallet.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("balance", e))?;

        Ok(balance)
    }
}

#[derive(Debug)]
struct CampaignRow {
    id: Uuid,
    name: String,
    owner: String,
    budget: i64,
    remaining: i64,
    active: bool,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for CampaignRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(CampaignRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            owner: row.try_get("owner")?,
            budget: row.try_get("budget")?,
            remaining: row.try_get("remaining")?,
            active: row.try_get("active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl CampaignRow {
    fn into_campaign(self) -> Result<Campaign, StoreError> {
        let owner = Wallet::new(self.owner).map_err(|e| invalid_row("campaigns.owner", e))?;
        Ok(Campaign {
            id: CampaignId::from_uuid(self.id),
            name: self.name,
            owner,
            budget: self.budget,
            remaining: self.remaining,
            active: self.active,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl CampaignStore for PostgresStores {
    async fn insert(&self, campaign: &Campaign) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO campaigns (id, name, owner, budget, remaining, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(campaign.id.as_uuid())
        .bind(&campaign.name)
        .bind(campaign.owner.as_str())
        .bind(campaign.budget)
        .bind(campaign.remaining)
        .bind(campaign.active)
        .bind(campaign.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;

        Ok(())
    }

    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, owner, budget, remaining, active, created_at
            FROM campaigns
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        match row {
            Some(row) => {
                let row = CampaignRow::from_row(&row).map_err(|e| invalid_row("campaigns", e))?;
                Ok(Some(row.into_campaign()?))
            }
            None => Ok(None),
        }
    }

    /// Single conditional UPDATE: the reservation either lands atomically or
    /// leaves the row untouched.
    #[instrument(skip(self), err)]
    async fn reserve(&self, id: CampaignId, amount: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET remaining = remaining - $2
            WHERE id = $1 AND active AND remaining >= $2
            "#,
        )
        .bind(id.as_uuid())
        .bind(amount)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reserve", e))?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        // Distinguish "short on funds" from "no such campaign".
        let exists: Option<i32> =
            sqlx::query_scalar(r#"SELECT 1 FROM campaigns WHERE id = $1"#)
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("reserve", e))?;

        if exists.is_none() {
            return Err(StoreError::NotFound);
        }
        Ok(false)
    }

    async fn add_funds(&self, id: CampaignId, amount: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET budget = budget + $2, remaining = remaining + $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(amount)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_funds", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn refund(&self, id: CampaignId, amount: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET remaining = remaining + $2
            WHERE id = $1 AND remaining + $2 <= budget
            "#,
        )
        .bind(id.as_uuid())
        .bind(amount)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("refund", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: Option<i32> =
            sqlx::query_scalar(r#"SELECT 1 FROM campaigns WHERE id = $1"#)
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("refund", e))?;

        if exists.is_none() {
            return Err(StoreError::NotFound);
        }
        Err(StoreError::Conflict(
            "refund would raise remaining above budget".to_string(),
        ))
    }
}

#[derive(Debug)]
struct MintJobRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    to_wallet: String,
    metadata_uri: String,
    metadata: serde_json::Value,
    client_id: String,
    status: String,
    processing_by: Option<String>,
    result: Option<serde_json::Value>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MintJobRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MintJobRow {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            to_wallet: row.try_get("to_wallet")?,
            metadata_uri: row.try_get("metadata_uri")?,
            metadata: row.try_get("metadata")?,
            client_id: row.try_get("client_id")?,
            status: row.try_get("status")?,
            processing_by: row.try_get("processing_by")?,
            result: row.try_get("result")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl MintJobRow {
    fn into_job(self) -> Result<MintJob, StoreError> {
        let to = Wallet::new(self.to_wallet).map_err(|e| invalid_row("mint_jobs.to_wallet", e))?;
        let status: MintJobStatus = self
            .status
            .parse()
            .map_err(|e| invalid_row("mint_jobs.status", e))?;
        let result = match self.result {
            Some(value) => {
                Some(serde_json::from_value(value).map_err(|e| invalid_row("mint_jobs.result", e))?)
            }
            None => None,
        };
        Ok(MintJob {
            id: MintJobId::from_uuid(self.id),
            created_at: self.created_at,
            request: MintRequest {
                to,
                metadata_uri: self.metadata_uri,
                metadata: self.metadata,
                client_id: self.client_id,
            },
            status,
            processing_by: self.processing_by,
            result,
            updated_at: self.updated_at,
        })
    }
}

const MINT_JOB_COLUMNS: &str = "id, created_at, to_wallet, metadata_uri, metadata, client_id, \
                                status, processing_by, result, updated_at";

#[async_trait]
impl MintJobStore for PostgresStores {
    #[instrument(skip(self, job), fields(job_id = %job.id), err)]
    async fn enqueue(&self, job: &MintJob) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO mint_jobs
                (id, created_at, to_wallet, metadata_uri, metadata, client_id,
                 status, processing_by, result, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id.0)
        .bind(job.created_at)
        .bind(job.request.to.as_str())
        .bind(&job.request.metadata_uri)
        .bind(&job.request.metadata)
        .bind(&job.request.client_id)
        .bind(job.status.as_str())
        .bind(&job.processing_by)
        .bind(
            job.result
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        )
        .bind(job.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("enqueue", e))?;

        Ok(())
    }

    async fn get(&self, id: MintJobId) -> Result<Option<MintJob>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {MINT_JOB_COLUMNS} FROM mint_jobs WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        match row {
            Some(row) => {
                let row = MintJobRow::from_row(&row).map_err(|e| invalid_row("mint_jobs", e))?;
                Ok(Some(row.into_job()?))
            }
            None => Ok(None),
        }
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<MintJob>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MINT_JOB_COLUMNS} FROM mint_jobs \
             WHERE status = 'queued' ORDER BY created_at ASC LIMIT $1"
        ))
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_pending", e))?;

        rows_into_jobs(rows)
    }

    /// Claim via one locked statement; degrade to a select-then-update loop
    /// (race-prone: two workers can both observe a job as queued) when the
    /// locked statement is not available on the backing store.
    #[instrument(skip(self), err)]
    async fn claim(&self, worker_id: &str, limit: usize) -> Result<Vec<MintJob>, StoreError> {
        let atomic = sqlx::query(&format!(
            "UPDATE mint_jobs \
             SET status = 'processing', processing_by = $1, updated_at = NOW() \
             WHERE id IN ( \
                 SELECT id FROM mint_jobs WHERE status = 'queued' \
                 ORDER BY created_at ASC LIMIT $2 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {MINT_JOB_COLUMNS}"
        ))
        .bind(worker_id)
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await;

        match atomic {
            Ok(rows) => rows_into_jobs(rows),
            Err(e) => {
                tracing::warn!("atomic claim unavailable, degrading to select-then-update: {e}");
                self.claim_select_then_update(worker_id, limit).await
            }
        }
    }

    async fn mark_result(&self, id: MintJobId, outcome: MintOutcome) -> Result<(), StoreError> {
        let status = match &outcome {
            MintOutcome::Forwarded { .. } => MintJobStatus::Forwarded,
            MintOutcome::Failed { .. } => MintJobStatus::Failed,
        };

        let result = sqlx::query(
            r#"
            UPDATE mint_jobs
            SET status = $2, result = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(status.as_str())
        .bind(serde_json::to_value(&outcome)?)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_result", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

impl PostgresStores {
    async fn claim_select_then_update(
        &self,
        worker_id: &str,
        limit: usize,
    ) -> Result<Vec<MintJob>, StoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM mint_jobs
            WHERE status = 'queued'
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim_select", e))?;

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query(&format!(
                "UPDATE mint_jobs \
                 SET status = 'processing', processing_by = $2, updated_at = NOW() \
                 WHERE id = $1 AND status = 'queued' \
                 RETURNING {MINT_JOB_COLUMNS}"
            ))
            .bind(id)
            .bind(worker_id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("claim_update", e))?;

            // None means another worker won the race for this id.
            if let Some(row) = row {
                let row = MintJobRow::from_row(&row).map_err(|e| invalid_row("mint_jobs", e))?;
                claimed.push(row.into_job()?);
            }
        }
        Ok(claimed)
    }
}

fn rows_into_jobs(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<MintJob>, StoreError> {
    let mut jobs = Vec::with_capacity(rows.len());
    for row in rows {
        let row = MintJobRow::from_row(&row).map_err(|e| invalid_row("mint_jobs", e))?;
        jobs.push(row.into_job()?);
    }
    Ok(jobs)
}

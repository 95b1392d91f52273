//! Mint job types and lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use beatschain_core::Wallet;

/// Unique mint job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MintJobId(pub Uuid);

impl MintJobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MintJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MintJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MintJobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Job execution status.
///
/// Jobs are single-attempt: `Forwarded` and `Failed` are both terminal.
/// There is no retry or dead-letter state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MintJobStatus {
    /// Waiting to be picked up by a worker.
    Queued,
    /// Claimed by a worker, forward in flight.
    Processing,
    /// Handed to the relayer; receipt recorded in `result`.
    Forwarded,
    /// Forward failed; reason recorded in `result`.
    Failed,
}

impl MintJobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MintJobStatus::Forwarded | MintJobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MintJobStatus::Queued => "queued",
            MintJobStatus::Processing => "processing",
            MintJobStatus::Forwarded => "forwarded",
            MintJobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for MintJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(MintJobStatus::Queued),
            "processing" => Ok(MintJobStatus::Processing),
            "forwarded" => Ok(MintJobStatus::Forwarded),
            "failed" => Ok(MintJobStatus::Failed),
            other => Err(format!("invalid mint job status: {other}")),
        }
    }
}

/// What a mint request asks the relayer to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    /// Recipient of the minted token.
    pub to: Wallet,
    /// Token metadata URI (typically `ipfs://…`).
    pub metadata_uri: String,
    /// Inline metadata, forwarded verbatim.
    pub metadata: serde_json::Value,
    /// Identifier of the storefront client that submitted the request.
    pub client_id: String,
}

/// Receipt returned by the relayer on a successful forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayReceipt {
    /// Relayer-side queue/transaction identifier.
    pub queue_id: String,
    /// Transaction hash, if the relayer already has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

/// Terminal outcome of processing one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum MintOutcome {
    Forwarded { receipt: RelayReceipt },
    Failed { reason: String },
}

/// A queued gasless-mint job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintJob {
    pub id: MintJobId,
    pub created_at: DateTime<Utc>,
    pub request: MintRequest,
    pub status: MintJobStatus,
    /// Worker that claimed the job, once claimed.
    pub processing_by: Option<String>,
    /// Terminal outcome, once processed.
    pub result: Option<MintOutcome>,
    pub updated_at: DateTime<Utc>,
}

impl MintJob {
    pub fn new(request: MintRequest) -> Self {
        let now = Utc::now();
        Self {
            id: MintJobId::new(),
            created_at: now,
            request,
            status: MintJobStatus::Queued,
            processing_by: None,
            result: None,
            updated_at: now,
        }
    }

    /// Claim the job for a worker.
    pub fn mark_processing(&mut self, worker_id: impl Into<String>) {
        self.status = MintJobStatus::Processing;
        self.processing_by = Some(worker_id.into());
        self.updated_at = Utc::now();
    }

    /// Record the relayer receipt and finish the job.
    pub fn mark_forwarded(&mut self, receipt: RelayReceipt) {
        self.status = MintJobStatus::Forwarded;
        self.result = Some(MintOutcome::Forwarded { receipt });
        self.updated_at = Utc::now();
    }

    /// Record the failure reason and finish the job. No retry follows.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = MintJobStatus::Failed;
        self.result = Some(MintOutcome::Failed {
            reason: reason.into(),
        });
        self.updated_at = Utc::now();
    }

    pub fn is_pending(&self) -> bool {
        self.status == MintJobStatus::Queued
    }
}

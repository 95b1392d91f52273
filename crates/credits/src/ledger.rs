use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use beatschain_core::{DomainError, Wallet};

/// One balance delta for a wallet (immutable once appended).
///
/// Note: entries are never updated or deleted; a wallet's balance is derived
/// by folding its deltas, not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditEntry {
    pub wallet: Wallet,
    /// Signed credit delta in whole credits. Never zero.
    pub delta: i64,
    /// Short machine tag, e.g. `"purchase"`, `"mint_refund"`.
    pub reason: String,
    /// Free-form context attached by the caller.
    #[serde(default)]
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl CreditEntry {
    pub fn new(
        wallet: Wallet,
        delta: i64,
        reason: impl Into<String>,
        meta: serde_json::Value,
    ) -> Result<Self, DomainError> {
        let reason = reason.into();
        if delta == 0 {
            return Err(DomainError::validation("credit delta must be non-zero"));
        }
        if reason.trim().is_empty() {
            return Err(DomainError::validation("credit reason must not be empty"));
        }
        Ok(Self {
            wallet,
            delta,
            reason,
            meta,
            created_at: Utc::now(),
        })
    }
}

/// Fold a wallet's balance out of its entries.
///
/// Widens to i128 while summing so pathological ledgers cannot overflow the
/// fold, then saturates back to i64.
pub fn balance_of<'a>(wallet: &Wallet, entries: impl IntoIterator<Item = &'a CreditEntry>) -> i64 {
    let total: i128 = entries
        .into_iter()
        .filter(|e| &e.wallet == wallet)
        .map(|e| i128::from(e.delta))
        .sum();

    total.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

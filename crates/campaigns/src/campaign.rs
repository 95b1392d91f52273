use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use beatschain_core::{CampaignId, DomainError, Wallet};

/// A promotional campaign with a reservable budget.
///
/// Invariant: `0 <= remaining <= budget`. All mutation goes through the
/// methods below; callers never touch the fields directly when enforcing
/// spend rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub owner: Wallet,
    /// Total budget in credits.
    pub budget: i64,
    /// Unreserved budget in credits.
    pub remaining: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(
        name: impl Into<String>,
        owner: Wallet,
        budget: i64,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("campaign name must not be empty"));
        }
        if budget <= 0 {
            return Err(DomainError::validation("campaign budget must be positive"));
        }
        Ok(Self {
            id: CampaignId::new(),
            name,
            owner,
            budget,
            remaining: budget,
            active: true,
            created_at: Utc::now(),
        })
    }

    /// Try to reserve `amount` from the remaining budget.
    ///
    /// Returns `Ok(false)` without mutating when the remaining budget is
    /// short; insufficient funds is an expected outcome, not a fault.
    pub fn reserve(&mut self, amount: i64) -> Result<bool, DomainError> {
        if amount <= 0 {
            return Err(DomainError::validation("reserve amount must be positive"));
        }
        if !self.active {
            return Err(DomainError::invariant("campaign is not active"));
        }
        if self.remaining < amount {
            return Ok(false);
        }
        self.remaining -= amount;
        Ok(true)
    }

    /// Return a previously reserved `amount` to the remaining budget.
    pub fn refund(&mut self, amount: i64) -> Result<(), DomainError> {
        if amount <= 0 {
            return Err(DomainError::validation("refund amount must be positive"));
        }
        if self.remaining + amount > self.budget {
            return Err(DomainError::invariant(
                "refund would raise remaining above budget",
            ));
        }
        self.remaining += amount;
        Ok(())
    }

    /// Grow the campaign: both budget and remaining increase.
    pub fn add_funds(&mut self, amount: i64) -> Result<(), DomainError> {
        if amount <= 0 {
            return Err(DomainError::validation("funding amount must be positive"));
        }
        self.budget += amount;
        self.remaining += amount;
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

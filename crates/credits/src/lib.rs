//! `beatschain-credits` — append-only credit ledger domain.

pub mod ledger;

pub use ledger::{balance_of, CreditEntry};

//! `beatschain-campaigns` — promotional campaign budgets.

pub mod campaign;

pub use campaign::Campaign;

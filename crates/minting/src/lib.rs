//! `beatschain-minting` — gasless-mint job types and lifecycle.

pub mod job;

pub use job::{MintJob, MintJobId, MintJobStatus, MintOutcome, MintRequest, RelayReceipt};

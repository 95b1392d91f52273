//! Infrastructure layer: persistence, relayer client, queue processing.

pub mod processor;
pub mod relayer;
pub mod store;

pub use processor::{spawn_poller, PollerConfig, ProcessedJob, QueueProcessor};
pub use relayer::{HttpRelayerClient, RelayerClient, RelayerError};
pub use store::{
    file::{FileCampaignStore, FileCreditStore, FileIsrcStore, FileMintJobStore},
    fallback::{FallbackCampaignStore, FallbackCreditStore, FallbackIsrcStore, FallbackMintJobStore},
    postgres::PostgresStores,
    CampaignStore, CreditStore, IsrcStore, MintJobStore, StoreError,
};

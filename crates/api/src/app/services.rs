//! Store and relayer wiring.
//!
//! Two modes, chosen at startup:
//! - file-only: no `DATABASE_URL`; every store is a local JSON file.
//! - postgres-with-fallback: Postgres is preferred, the file stores take
//!   over per-operation when it fails.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::{info, warn};

use beatschain_infra::{
    CampaignStore, CreditStore, FallbackCampaignStore, FallbackCreditStore, FallbackIsrcStore,
    FallbackMintJobStore, FileCampaignStore, FileCreditStore, FileIsrcStore, FileMintJobStore,
    HttpRelayerClient, IsrcStore, MintJobStore, PostgresStores, QueueProcessor, RelayerClient,
};

use crate::config::AppConfig;

/// Shared handles used by the route handlers.
pub struct AppServices {
    pub isrc: Arc<dyn IsrcStore>,
    pub credits: Arc<dyn CreditStore>,
    pub campaigns: Arc<dyn CampaignStore>,
    pub mint_jobs: Arc<dyn MintJobStore>,
    /// Absent when no relayer is configured; `process-queue` then refuses.
    pub processor: Option<Arc<QueueProcessor>>,
}

struct FileStores {
    isrc: Arc<FileIsrcStore>,
    credits: Arc<FileCreditStore>,
    campaigns: Arc<FileCampaignStore>,
    mint_jobs: Arc<FileMintJobStore>,
}

fn build_file_stores(data_dir: &Path) -> anyhow::Result<FileStores> {
    Ok(FileStores {
        isrc: Arc::new(FileIsrcStore::new(data_dir).context("isrc file store")?),
        credits: Arc::new(FileCreditStore::new(data_dir).context("credit file store")?),
        campaigns: Arc::new(FileCampaignStore::new(data_dir).context("campaign file store")?),
        mint_jobs: Arc::new(FileMintJobStore::new(data_dir).context("mint job file store")?),
    })
}

impl AppServices {
    /// File-only services, used without a database and by the test suite.
    pub fn file_only(
        data_dir: &Path,
        relayer: Option<Arc<dyn RelayerClient>>,
    ) -> anyhow::Result<Self> {
        let files = build_file_stores(data_dir)?;
        let mint_jobs: Arc<dyn MintJobStore> = files.mint_jobs;
        let processor = relayer
            .map(|relayer| Arc::new(QueueProcessor::new(mint_jobs.clone(), relayer)));

        Ok(Self {
            isrc: files.isrc,
            credits: files.credits,
            campaigns: files.campaigns,
            mint_jobs,
            processor,
        })
    }

    /// Wire services from process configuration.
    ///
    /// An unreachable database degrades to file-only at startup; per-request
    /// degradation is handled by the fallback stores.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let relayer: Option<Arc<dyn RelayerClient>> = match &config.relayer_url {
            Some(url) => Some(Arc::new(
                HttpRelayerClient::new(url, HttpRelayerClient::DEFAULT_TIMEOUT)
                    .context("relayer client")?,
            )),
            None => {
                warn!("RELAYER_URL not set; mint queue processing is disabled");
                None
            }
        };

        let Some(database_url) = &config.database_url else {
            info!("DATABASE_URL not set; using file stores at {:?}", config.data_dir);
            return Self::file_only(&config.data_dir, relayer);
        };

        let pool = match PgPool::connect(database_url).await {
            Ok(pool) => pool,
            Err(e) => {
                warn!("database unreachable, falling back to file stores: {e}");
                return Self::file_only(&config.data_dir, relayer);
            }
        };

        let pg = Arc::new(PostgresStores::new(pool));
        if let Err(e) = pg.ensure_schema().await {
            warn!("schema init failed, falling back to file stores: {e}");
            return Self::file_only(&config.data_dir, relayer);
        }
        info!("postgres stores ready, file fallback at {:?}", config.data_dir);

        let files = build_file_stores(&config.data_dir)?;
        let mint_jobs: Arc<dyn MintJobStore> =
            Arc::new(FallbackMintJobStore::new(pg.clone(), files.mint_jobs));
        let processor = relayer
            .map(|relayer| Arc::new(QueueProcessor::new(mint_jobs.clone(), relayer)));

        Ok(Self {
            isrc: Arc::new(FallbackIsrcStore::new(pg.clone(), files.isrc)),
            credits: Arc::new(FallbackCreditStore::new(pg.clone(), files.credits)),
            campaigns: Arc::new(FallbackCampaignStore::new(pg, files.campaigns)),
            mint_jobs,
            processor,
        })
    }
}

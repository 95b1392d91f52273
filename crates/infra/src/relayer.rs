//! Gasless-mint relayer client.
//!
//! The relayer is an external HTTP collaborator: we hand it a mint job and
//! receive a queue receipt. Everything past that boundary (gas, contract
//! calls, confirmation) is opaque to this service.

use std::time::Duration;

use async_trait::async_trait;

use beatschain_minting::{MintJob, RelayReceipt};

/// Relayer interaction error.
#[derive(Debug, thiserror::Error)]
pub enum RelayerError {
    #[error("relayer request failed: {0}")]
    Http(String),
    #[error("relayer rejected job ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("relayer response invalid: {0}")]
    InvalidResponse(String),
}

/// Outbound interface to the relayer.
#[async_trait]
pub trait RelayerClient: Send + Sync {
    /// Forward one mint job. Success means the relayer accepted the job into
    /// its own queue, not that the mint is confirmed on-chain.
    async fn forward_mint(&self, job: &MintJob) -> Result<RelayReceipt, RelayerError>;
}

/// HTTP relayer client.
#[derive(Debug, Clone)]
pub struct HttpRelayerClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRelayerClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RelayerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayerError::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl RelayerClient for HttpRelayerClient {
    async fn forward_mint(&self, job: &MintJob) -> Result<RelayReceipt, RelayerError> {
        let url = format!("{}/relay/mint", self.base_url);
        let body = serde_json::json!({
            "job_id": job.id,
            "to": job.request.to,
            "metadata_uri": job.request.metadata_uri,
            "metadata": job.request.metadata,
            "client_id": job.request.client_id,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayerError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RelayerError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<RelayReceipt>()
            .await
            .map_err(|e| RelayerError::InvalidResponse(e.to_string()))
    }
}

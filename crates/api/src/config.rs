//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string. When unset the service runs on local
    /// JSON file stores only.
    pub database_url: Option<String>,
    /// Directory for the JSON fallback stores.
    pub data_dir: PathBuf,
    /// Shared secret for admin routes. When unset, admin routes reject
    /// every request.
    pub admin_key: Option<String>,
    /// Base URL of the gasless-mint relayer.
    pub relayer_url: Option<String>,
    /// Listen address.
    pub bind_addr: String,
    /// Background mint-queue poll interval; `None` disables the poller.
    pub poller_interval: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").ok();
        let data_dir = std::env::var("BEATSCHAIN_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let admin_key = std::env::var("ADMIN_API_KEY").ok().filter(|k| !k.is_empty());
        let relayer_url = std::env::var("RELAYER_URL").ok().filter(|u| !u.is_empty());
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let poller_interval = std::env::var("MINT_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            database_url,
            data_dir,
            admin_key,
            relayer_url,
            bind_addr,
            poller_interval,
        }
    }
}

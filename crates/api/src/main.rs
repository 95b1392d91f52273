use beatschain_api::app::{self, AppServices};
use beatschain_api::config::AppConfig;
use beatschain_infra::{spawn_poller, PollerConfig};

#[tokio::main]
async fn main() {
    beatschain_observability::init();

    let config = AppConfig::from_env();
    if config.admin_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not set; admin endpoints will reject all requests");
    }

    let services = AppServices::from_config(&config)
        .await
        .expect("failed to wire services");

    if let (Some(processor), Some(interval)) = (&services.processor, config.poller_interval) {
        spawn_poller(
            processor.clone(),
            PollerConfig {
                interval,
                ..PollerConfig::default()
            },
        );
    }

    let app = app::build_app(services, config.admin_key.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.bind_addr));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}

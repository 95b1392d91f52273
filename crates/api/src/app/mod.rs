//! HTTP API application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: store/relayer wiring (Postgres-with-file-fallback or file-only)
//! - `routes/`: HTTP routes + handlers (one file per subsystem)
//! - `errors.rs`: consistent `{ success: false, message }` error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices, admin_key: Option<String>) -> Router {
    let services = Arc::new(services);
    let admin_state = middleware::AdminState { key: admin_key };

    let public = Router::new()
        .nest("/api/isrc", routes::isrc::router())
        .nest("/api/credits", routes::credits::router())
        .nest("/api/campaigns", routes::campaigns::router())
        .nest("/api/mint", routes::mint::router());

    // Admin routes: require the x-admin-key shared secret.
    let admin = Router::new()
        .nest("/api/campaigns", routes::campaigns::admin_router())
        .nest("/api/mint", routes::mint::admin_router())
        .layer(axum::middleware::from_fn_with_state(
            admin_state,
            middleware::admin_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(public)
        .merge(admin)
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}

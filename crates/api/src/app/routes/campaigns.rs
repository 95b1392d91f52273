use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use beatschain_campaigns::Campaign;
use beatschain_core::{CampaignId, Wallet};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_campaign))
        .route("/:id/reserve", post(reserve))
}

/// Routes behind the admin key.
pub fn admin_router() -> Router {
    Router::new()
        .route("/", post(create))
        .route("/:id/funds", post(add_funds))
        .route("/:id/refund", post(refund))
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    name: String,
    owner: String,
    budget: i64,
}

#[derive(Debug, Deserialize)]
struct AmountRequest {
    amount: i64,
}

fn parse_id(id: &str) -> Result<CampaignId, axum::response::Response> {
    id.parse::<CampaignId>()
        .map_err(errors::domain_error_to_response)
}

fn campaign_to_json(c: &Campaign) -> serde_json::Value {
    serde_json::json!({
        "id": c.id.to_string(),
        "name": c.name,
        "owner": c.owner.to_string(),
        "budget": c.budget,
        "remaining": c.remaining,
        "active": c.active,
        "created_at": c.created_at,
    })
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateRequest>,
) -> axum::response::Response {
    let owner = match Wallet::new(body.owner) {
        Ok(w) => w,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let campaign = match Campaign::new(body.name, owner, body.budget) {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = services.campaigns.insert(&campaign).await {
        return errors::store_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "campaign": campaign_to_json(&campaign) })),
    )
        .into_response()
}

pub async fn get_campaign(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.campaigns.get(id).await {
        Ok(Some(c)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "campaign": campaign_to_json(&c) })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "campaign not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn reserve(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<AmountRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if body.amount <= 0 {
        return errors::json_error(StatusCode::BAD_REQUEST, "amount must be positive");
    }

    match services.campaigns.reserve(id, body.amount).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "reserved": true })),
        )
            .into_response(),
        Ok(false) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "success": false,
                "reserved": false,
                "message": "insufficient budget",
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn add_funds(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<AmountRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if body.amount <= 0 {
        return errors::json_error(StatusCode::BAD_REQUEST, "amount must be positive");
    }

    match services.campaigns.add_funds(id, body.amount).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn refund(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<AmountRequest>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if body.amount <= 0 {
        return errors::json_error(StatusCode::BAD_REQUEST, "amount must be positive");
    }

    match services.campaigns.refund(id, body.amount).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

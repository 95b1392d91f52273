use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use beatschain_core::Wallet;
use beatschain_credits::CreditEntry;

use crate::app::errors;
use crate::app::services::AppServices;

const DEFAULT_HISTORY_LIMIT: usize = 50;

pub fn router() -> Router {
    Router::new()
        .route("/append", post(append))
        .route("/:wallet/balance", get(balance))
        .route("/:wallet/history", get(history))
}

#[derive(Debug, Deserialize)]
struct AppendRequest {
    wallet: String,
    delta: i64,
    reason: String,
    #[serde(default)]
    meta: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

pub async fn append(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<AppendRequest>,
) -> axum::response::Response {
    let wallet = match Wallet::new(body.wallet) {
        Ok(w) => w,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let entry = match CreditEntry::new(wallet, body.delta, body.reason, body.meta) {
        Ok(e) => e,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = services.credits.append(&entry).await {
        return errors::store_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "wallet": entry.wallet.to_string(),
            "delta": entry.delta,
        })),
    )
        .into_response()
}

pub async fn balance(
    Extension(services): Extension<Arc<AppServices>>,
    Path(wallet): Path<String>,
) -> axum::response::Response {
    let wallet = match Wallet::new(wallet) {
        Ok(w) => w,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.credits.balance(&wallet).await {
        Ok(balance) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "wallet": wallet.to_string(),
                "balance": balance,
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(wallet): Path<String>,
    Query(params): Query<HistoryParams>,
) -> axum::response::Response {
    let wallet = match Wallet::new(wallet) {
        Ok(w) => w,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let entries = match services.credits.entries_for_wallet(&wallet, limit).await {
        Ok(entries) => entries,
        Err(e) => return errors::store_error_to_response(e),
    };

    let entries = entries
        .iter()
        .map(|e| {
            serde_json::json!({
                "delta": e.delta,
                "reason": e.reason,
                "meta": e.meta,
                "created_at": e.created_at,
            })
        })
        .collect::<Vec<_>>();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "wallet": wallet.to_string(),
            "entries": entries,
        })),
    )
        .into_response()
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;

use beatschain_core::UserId;
use beatschain_isrc::{allocate, designation_range_for, IsrcRecord};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/codes/:user_id", get(list_codes))
}

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    title: String,
    artist: String,
    user_id: String,
}

pub async fn generate(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<GenerateRequest>,
) -> axum::response::Response {
    let user_id = match UserId::new(&body.user_id) {
        Ok(u) => u,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let range = designation_range_for(&user_id);
    let year = (Utc::now().year() % 100) as u8;

    let highest = match services.isrc.highest_designation(range, year).await {
        Ok(h) => h,
        Err(e) => return errors::store_error_to_response(e),
    };

    let code = match allocate(&user_id, year, highest) {
        Ok(code) => code,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let record = match IsrcRecord::new(code, body.title, body.artist, user_id) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = services.isrc.insert_record(&record).await {
        return errors::store_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "isrc": record.isrc.to_string(),
            "generated_at": record.generated_at,
        })),
    )
        .into_response()
}

pub async fn list_codes(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let user_id = match UserId::new(user_id) {
        Ok(u) => u,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let records = match services.isrc.records_for_user(&user_id).await {
        Ok(r) => r,
        Err(e) => return errors::store_error_to_response(e),
    };

    let codes = records
        .iter()
        .map(|r| {
            serde_json::json!({
                "isrc": r.isrc.to_string(),
                "track_title": r.track_title,
                "artist_name": r.artist_name,
                "generated_at": r.generated_at,
                "used": r.used,
            })
        })
        .collect::<Vec<_>>();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "codes": codes })),
    )
        .into_response()
}

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
use beatschain_minting::{MintJob, MintJobId, MintRequest};

use crate::app::errors;
use crate::app::services::AppServices;

const DEFAULT_PENDING_LIMIT: usize = 50;
const MAX_PROCESS_BATCH: usize = 100;

pub fn router() -> Router {
    Router::new()
        .route("/", post(enqueue))
        .route("/status/:id", get(status))
        .route("/pending", get(pending))
}

/// Routes behind the admin key.
pub fn admin_router() -> Router {
    Router::new().route("/process-queue", post(process_queue))
}

#[derive(Debug, Deserialize)]
struct EnqueueRequest {
    to: String,
    metadata_uri: String,
    #[serde(default)]
    metadata: serde_json::Value,
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct PendingParams {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ProcessRequest {
    worker_id: String,
    limit: Option<usize>,
}

fn job_to_json(job: &MintJob) -> serde_json::Value {
    serde_json::json!({
        "id": job.id.to_string(),
        "created_at": job.created_at,
        "to": job.request.to.to_string(),
        "metadata_uri": job.request.metadata_uri,
        "client_id": job.request.client_id,
        "status": job.status.as_str(),
        "processing_by": job.processing_by,
        "result": job.result,
        "updated_at": job.updated_at,
    })
}

pub async fn enqueue(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<EnqueueRequest>,
) -> axum::response::Response {
    let to = match Wallet::new(body.to) {
        Ok(w) => w,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if body.metadata_uri.trim().is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "metadata_uri must not be empty");
    }
    if body.client_id.trim().is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "client_id must not be empty");
    }

    let job = MintJob::new(MintRequest {
        to,
        metadata_uri: body.metadata_uri,
        metadata: body.metadata,
        client_id: body.client_id,
    });

    if let Err(e) = services.mint_jobs.enqueue(&job).await {
        return errors::store_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "job_id": job.id.to_string() })),
    )
        .into_response()
}

pub async fn status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MintJobId = match id.parse() {
        Ok(id) => id,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid job id"),
    };

    match services.mint_jobs.get(id).await {
        Ok(Some(job)) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true, "job": job_to_json(&job) })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "job not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn pending(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<PendingParams>,
) -> axum::response::Response {
    let limit = params.limit.unwrap_or(DEFAULT_PENDING_LIMIT);
    match services.mint_jobs.list_pending(limit).await {
        Ok(jobs) => {
            let jobs = jobs.iter().map(job_to_json).collect::<Vec<_>>();
            (
                StatusCode::OK,
                Json(serde_json::json!({ "success": true, "jobs": jobs })),
            )
                .into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn process_queue(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<ProcessRequest>,
) -> axum::response::Response {
    let Some(processor) = &services.processor else {
        return errors::json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "no relayer configured; queue processing is disabled",
        );
    };
    if body.worker_id.trim().is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "worker_id must not be empty");
    }

    let limit = body.limit.unwrap_or(DEFAULT_PENDING_LIMIT).min(MAX_PROCESS_BATCH);
    match processor.process(body.worker_id.trim(), limit).await {
        Ok(processed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "processed": processed,
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

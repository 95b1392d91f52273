use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use beatschain_core::DomainError;
use beatschain_infra::StoreError;

/// Uniform failure envelope: `{ "success": false, "message": … }`.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, msg)
        }
        DomainError::RangeExhausted(msg) => json_error(StatusCode::UNPROCESSABLE_ENTITY, msg),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not found"),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, msg),
        StoreError::Serialization(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
        StoreError::Io(msg) | StoreError::Database(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
        StoreError::Unavailable(msg) => json_error(StatusCode::SERVICE_UNAVAILABLE, msg),
    }
}

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// Shared secret guarding admin routes.
///
/// `key == None` means no secret was configured; every admin request is
/// rejected rather than silently unprotected.
#[derive(Clone)]
pub struct AdminState {
    pub key: Option<String>,
}

pub async fn admin_middleware(
    State(state): State<AdminState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = extract_admin_key(req.headers())?;

    match &state.key {
        Some(expected) if presented == expected => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

fn extract_admin_key(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get("x-admin-key")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let key = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?.trim();
    if key.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(key)
}

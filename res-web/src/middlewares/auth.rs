//! Root API-key check: the minimal shared-secret gate `auth.rootApiKey`
//! implies. Not a stand-in for a full auth provider; per-client API keys
//! are an external collaborator's concern.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use res_core::AppError;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn require_root_api_key(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let provided = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if key == state.auth.root_api_key => Ok(next.run(req).await),
        _ => Err(ApiError(AppError::Unauthorized)),
    }
}

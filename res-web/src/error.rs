//! Translates [`res_core::AppError`] into an HTTP response at the web boundary.
//!
//! Converts directly from the workspace's own error enum rather than
//! downcasting an `anyhow::Error` chain, since every source error type
//! (`StoreError`, `BlobError`, `BusError`) already has a `From` impl into
//! `AppError`.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use res_core::AppError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let name = match &self.0 {
            AppError::Validation { .. } => "BadRequest",
            AppError::NotFound { .. } => "NotFound",
            AppError::Unauthorized => "Unauthorized",
            AppError::Conflict { .. } => "Conflict",
            AppError::Transient { .. } => "ServiceUnavailable",
            AppError::Internal { .. } => "Internal",
            AppError::Config { .. } => "Internal",
        };

        let body = json!({
            "name": name,
            "code": status,
            "message": self.0.to_string(),
        });

        (axum::http::StatusCode::from_u16(status).unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR), Json(body))
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn not_found_maps_to_404() {
        let resp = ApiError(AppError::not_found("task abc")).into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let resp = ApiError(AppError::Unauthorized).into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn transient_maps_to_503() {
        let resp = ApiError(AppError::transient(anyhow::anyhow!("bus unavailable"))).into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }
}

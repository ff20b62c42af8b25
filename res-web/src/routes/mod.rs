mod health;
mod report;
mod status;
mod upload;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middlewares::{auth::require_root_api_key, request_id::ensure_request_id};
use crate::state::AppState;

pub fn router(state: AppState) -> Router<()> {
    let v1 = Router::new()
        .route("/task/upload", post(upload::ingest_chunk))
        .route("/task/status/{taskId}", get(status::get_status))
        .route("/task/report/{taskId}", get(report::get_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_root_api_key));

    Router::new()
        .route("/healthz", get(health::healthz))
        .nest("/v1", v1)
        .layer(middleware::from_fn(ensure_request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

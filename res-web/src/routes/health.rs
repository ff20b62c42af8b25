//! `GET /healthz`: liveness only. Does not probe downstream dependencies;
//! a transient Mongo/Redis/S3 hiccup shouldn't flap the liveness probe.

use axum::Json;
use serde_json::{json, Value};

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

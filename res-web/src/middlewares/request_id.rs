//! Stamps every request/response pair with an `x-request-id`, generating one
//! when the caller didn't supply it.

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub async fn ensure_request_id(mut req: Request<Body>, next: Next) -> Response {
    let header = HeaderName::from_static("x-request-id");

    let request_id = req
        .headers()
        .get(&header)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if req.headers().get(&header).is_none() {
        if let Ok(v) = HeaderValue::from_str(&request_id) {
            req.headers_mut().insert(header.clone(), v);
        }
    }

    let mut res = next.run(req).await;

    if res.headers().get(&header).is_none() {
        if let Ok(v) = HeaderValue::from_str(&request_id) {
            res.headers_mut().insert(header, v);
        }
    }

    res
}

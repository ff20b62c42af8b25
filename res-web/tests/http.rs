//! Router-level HTTP tests against a live MongoDB instance.
//!
//! `#[ignore]`d since they need a reachable store; run with
//! `cargo test -- --ignored` against a disposable MongoDB/Redis/S3 stack.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use res_blob::{ChunkUploadCoordinator, RedisUploadSessionStore, S3CompatibleStore};
use res_core::{AuthConfig, MongoConfig, S3Config};
use res_store::Store;
use std::sync::Arc;
use tower::ServiceExt;

async fn test_state() -> res_web::AppState {
    let store = Store::connect(&MongoConfig {
        url: std::env::var("MONGODB_URL").expect("MONGODB_URL"),
        db_name: format!("res_web_it_{}", std::process::id()),
    })
    .await
    .expect("mongodb connection");

    let sessions = RedisUploadSessionStore::connect(&std::env::var("REDIS_URL").expect("REDIS_URL"))
        .await
        .expect("redis connection");

    let blob_store = S3CompatibleStore::from_config(&S3Config {
        access_key_id: std::env::var("S3_ACCESS_KEY_ID").expect("S3_ACCESS_KEY_ID"),
        secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY").expect("S3_SECRET_ACCESS_KEY"),
        region: std::env::var("S3_REGION").expect("S3_REGION"),
        endpoint: std::env::var("S3_ENDPOINT").expect("S3_ENDPOINT"),
        bucket_name: std::env::var("S3_BUCKET_NAME").expect("S3_BUCKET_NAME"),
    })
    .await;

    let uploads = Arc::new(ChunkUploadCoordinator::new(Arc::new(blob_store), Arc::new(sessions)));
    res_web::AppState::new(store, uploads, AuthConfig { root_api_key: "test-key".into() })
}

#[tokio::test]
#[ignore = "requires a live MongoDB/Redis/S3; run with --ignored against docker-compose services"]
async fn healthz_responds_ok_without_auth() {
    let router = res_web::router(test_state().await);

    let response = router
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], br#"{"status":"ok"}"#);
}

#[tokio::test]
#[ignore = "requires a live MongoDB/Redis/S3; run with --ignored against docker-compose services"]
async fn status_without_api_key_is_unauthorized() {
    let router = res_web::router(test_state().await);

    let response = router
        .oneshot(Request::builder().uri("/v1/task/status/does-not-exist").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "requires a live MongoDB/Redis/S3; run with --ignored against docker-compose services"]
async fn status_for_unknown_task_is_not_found() {
    let router = res_web::router(test_state().await);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/v1/task/status/does-not-exist")
                .header("x-api-key", "test-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

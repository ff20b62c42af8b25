//! `POST /v1/task/upload`: one chunk of a multipart/form-data request per
//! call; the coordinator in `res-blob` drives the actual multipart-upload
//! state machine, this handler only pulls the wire fields out and reacts to
//! [`ChunkOutcome`].

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use futures::stream;
use res_blob::{ChunkOutcome, ChunkRequest};
use res_core::AppError;
use res_store::create_task_with_event;
use serde_json::json;
use tracing::instrument;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn bytes_to_stream(bytes: Bytes) -> res_blob::ByteStream {
    Box::pin(stream::once(async move { Ok::<_, std::io::Error>(bytes) }))
}

#[instrument(skip(state, multipart))]
pub async fn ingest_chunk(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<impl IntoResponse> {
    let mut upload_id: Option<String> = None;
    let mut original_file_name: Option<String> = None;
    let mut chunk_number: Option<u32> = None;
    let mut total_chunks: Option<u32> = None;
    let mut mime_type: Option<String> = None;
    let mut body: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError(AppError::validation(format!("malformed multipart body: {e}"))))?
    {
        match field.name().unwrap_or("") {
            "uploadId" => upload_id = Some(field.text().await.map_err(multipart_err)?),
            "originalFileName" => original_file_name = Some(field.text().await.map_err(multipart_err)?),
            "chunkNumber" => {
                let raw = field.text().await.map_err(multipart_err)?;
                chunk_number = Some(raw.parse().map_err(|_| ApiError(AppError::validation("chunkNumber must be an integer")))?);
            }
            "totalChunks" => {
                let raw = field.text().await.map_err(multipart_err)?;
                total_chunks = Some(raw.parse().map_err(|_| ApiError(AppError::validation("totalChunks must be an integer")))?);
            }
            "file" => {
                mime_type = field.content_type().map(|s| s.to_string());
                body = Some(field.bytes().await.map_err(multipart_err)?);
            }
            _ => {
                // Unknown field: drain and ignore.
                let _ = field.bytes().await;
            }
        }
    }

    let upload_id = upload_id.ok_or_else(|| ApiError(AppError::validation("missing uploadId field")))?;
    let original_file_name = original_file_name.ok_or_else(|| ApiError(AppError::validation("missing originalFileName field")))?;
    let chunk_number = chunk_number.ok_or_else(|| ApiError(AppError::validation("missing chunkNumber field")))?;
    let total_chunks = total_chunks.ok_or_else(|| ApiError(AppError::validation("missing totalChunks field")))?;
    let body = body.ok_or_else(|| ApiError(AppError::validation("missing file field")))?;
    let mime_type = mime_type.unwrap_or_default();

    let req = ChunkRequest {
        upload_id,
        chunk_number,
        total_chunks,
        original_file_name,
        mime_type,
        body: bytes_to_stream(body),
    };

    let outcome = state.uploads.ingest_chunk(req).await.map_err(AppError::from)?;

    match outcome {
        ChunkOutcome::Partial { .. } => Ok((StatusCode::OK, Json(json!({ "status": "chunk_received" }))).into_response()),
        ChunkOutcome::Complete { bucket_file_path, original_file_name, .. } => {
            let task_id = create_task_with_event(&state.store, &state.tasks, &state.events, bucket_file_path, original_file_name)
                .await
                .map_err(AppError::from)?;
            Ok((StatusCode::CREATED, Json(json!({ "taskId": task_id }))).into_response())
        }
    }
}

fn multipart_err(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError(AppError::validation(format!("malformed multipart field: {e}")))
}

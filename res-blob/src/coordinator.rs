//! Drives the chunked-upload algorithm: initiate on the first chunk,
//! accumulate parts, complete the multipart upload on the last chunk.
//!
//! This coordinator only owns object-store and session-cache state; it
//! has no knowledge of `Task`/`Event` records. Callers (the ingress
//! HTTP handler) react to [`ChunkOutcome::Complete`] by creating the
//! Task and its outbox Event in one store transaction.

use crate::error::BlobError;
use crate::session::UploadSession;
use crate::session_store::UploadSessionStore;
use crate::store::{CompletedPart, MultipartBlobStore};
use crate::{new_upload_key, BlobResult, ByteStream};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, instrument};

pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

static FILE_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w,\s-]+\.xlsx$").expect("valid regex"));

pub struct ChunkRequest {
    pub upload_id: String,
    pub chunk_number: u32,
    pub total_chunks: u32,
    pub original_file_name: String,
    pub mime_type: String,
    pub body: ByteStream,
}

pub enum ChunkOutcome {
    Partial { chunks_received: u32, total_chunks: u32 },
    Complete { bucket_file_path: String, original_file_name: String, size_bytes: u64 },
}

pub struct ChunkUploadCoordinator {
    store: Arc<dyn MultipartBlobStore>,
    sessions: Arc<dyn UploadSessionStore>,
}

impl ChunkUploadCoordinator {
    pub fn new(store: Arc<dyn MultipartBlobStore>, sessions: Arc<dyn UploadSessionStore>) -> Self {
        Self { store, sessions }
    }

    fn validate(req: &ChunkRequest) -> BlobResult<()> {
        if req.total_chunks == 0 {
            return Err(BlobError::invalid("totalChunks must be at least 1"));
        }
        if req.chunk_number >= req.total_chunks {
            return Err(BlobError::invalid(format!(
                "chunkNumber {} must be less than totalChunks {}",
                req.chunk_number, req.total_chunks
            )));
        }
        if !FILE_NAME_PATTERN.is_match(&req.original_file_name) {
            return Err(BlobError::invalid(format!(
                "originalFileName {:?} does not match the expected .xlsx pattern",
                req.original_file_name
            )));
        }
        if req.mime_type != XLSX_CONTENT_TYPE {
            return Err(BlobError::invalid(format!("unsupported content type {}", req.mime_type)));
        }
        Ok(())
    }

    #[instrument(skip(self, req), fields(upload_id = %req.upload_id, chunk_number = req.chunk_number, total_chunks = req.total_chunks))]
    pub async fn ingest_chunk(&self, req: ChunkRequest) -> BlobResult<ChunkOutcome> {
        Self::validate(&req)?;

        let mut session = if req.chunk_number == 0 {
            let bucket_file_path = new_upload_key(&req.original_file_name);
            let s3_upload_id = self.store.init_multipart(&bucket_file_path, Some(&req.mime_type)).await?;

            let session = UploadSession::new(
                s3_upload_id,
                bucket_file_path,
                req.total_chunks,
                req.original_file_name.clone(),
                req.mime_type.clone(),
            );
            self.sessions.create(&req.upload_id, &session).await?;
            session
        } else {
            self.sessions
                .get(&req.upload_id)
                .await?
                .ok_or_else(|| BlobError::upload_not_found(req.upload_id.clone()))?
        };

        let part_number = req.chunk_number as i32 + 1;
        let part = self
            .store
            .put_part(&session.bucket_file_path, &session.s3_upload_id, part_number, req.body)
            .await?;

        session.record_part(part_number, part.etag);

        let is_final = req.chunk_number == req.total_chunks - 1;

        if !is_final {
            self.sessions.save(&req.upload_id, &session).await?;
            return Ok(ChunkOutcome::Partial {
                chunks_received: session.uploaded_parts.len() as u32,
                total_chunks: req.total_chunks,
            });
        }

        let parts: Vec<CompletedPart> = session
            .sorted_parts()
            .into_iter()
            .map(|p| CompletedPart { part_number: p.part_number, etag: p.e_tag })
            .collect();

        let result = self
            .store
            .complete_multipart(&session.bucket_file_path, &session.s3_upload_id, parts)
            .await;

        let result = match result {
            Ok(r) => r,
            Err(err) => {
                // Best-effort cleanup; the completion error is what propagates.
                let _ = self.store.abort_multipart(&session.bucket_file_path, &session.s3_upload_id).await;
                return Err(err);
            }
        };

        let _ = self.sessions.delete(&req.upload_id).await;

        info!(bucket_file_path = %session.bucket_file_path, "multipart upload assembled");

        Ok(ChunkOutcome::Complete {
            bucket_file_path: session.bucket_file_path,
            original_file_name: session.original_file_name,
            size_bytes: result.size_bytes,
        })
    }
}

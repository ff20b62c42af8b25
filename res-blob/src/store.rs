use crate::{BlobResult, ByteStream};
use async_trait::async_trait;
use uuid::Uuid;

/// Core object storage operations that a backend must implement.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, content_type: Option<&str>, stream: ByteStream) -> BlobResult<PutResult>;

    async fn get(&self, key: &str) -> BlobResult<GetResult>;

    async fn head(&self, key: &str) -> BlobResult<ObjectHead>;

    async fn delete(&self, key: &str) -> BlobResult<()>;
}

/// Multipart upload support, required by the chunked-upload coordinator.
#[async_trait]
pub trait MultipartBlobStore: BlobStore {
    async fn init_multipart(&self, key: &str, content_type: Option<&str>) -> BlobResult<String>;

    async fn put_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        stream: ByteStream,
    ) -> BlobResult<PartETag>;

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> BlobResult<PutResult>;

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> BlobResult<()>;
}

#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

pub struct GetResult {
    pub stream: ByteStream,
    pub size_bytes: u64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PartETag {
    pub part_number: i32,
    pub etag: String,
}

#[derive(Debug, Clone)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Builds the object key a freshly-initiated upload will land at:
/// `uploads/<uuid>/<originalFileName>`.
pub fn new_upload_key(original_file_name: &str) -> String {
    format!("uploads/{}/{}", Uuid::new_v4(), original_file_name)
}

//! Blob storage: streaming object-store access plus a cache-backed
//! coordinator for chunked, client-driven multipart uploads.

use bytes::Bytes;
use futures_core::Stream;
use std::pin::Pin;

pub mod coordinator;
pub mod error;
pub mod s3_store;
pub mod session;
pub mod session_store;
pub mod store;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

pub use coordinator::{ChunkOutcome, ChunkRequest, ChunkUploadCoordinator};
pub use error::{BlobError, BlobResult};
pub use s3_store::S3CompatibleStore;
pub use session::UploadSession;
pub use session_store::{RedisUploadSessionStore, UploadSessionStore};
pub use store::{new_upload_key, BlobStore, CompletedPart, GetResult, MultipartBlobStore, ObjectHead, PartETag, PutResult};

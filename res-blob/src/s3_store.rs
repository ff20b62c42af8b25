//! S3-compatible object store backend.
//!
//! Talks to any S3-compatible endpoint (AWS S3, MinIO, etc.) via
//! `aws-sdk-s3`, configured from the `s3.*` keys in [`res_core::S3Config`].
//! Transient failures (network errors, 5xx responses) are retried
//! in-process with exponential backoff before surfacing as [`BlobError::Backend`].

use crate::error::BlobError;
use crate::store::{BlobStore, CompletedPart, GetResult, MultipartBlobStore, ObjectHead, PartETag, PutResult};
use crate::{BlobResult, ByteStream};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream as AwsByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as AwsCompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures_util::StreamExt;
use res_core::S3Config;
use std::time::Duration;
use tracing::{instrument, warn};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Retries a fallible S3 call with exponential backoff and jitter,
/// per the object-store transient-error policy.
async fn with_retry<T, F, Fut>(op_name: &'static str, mut f: F) -> BlobResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, aws_sdk_s3::error::SdkError<impl std::error::Error + Send + Sync + 'static>>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(v) => return Ok(v),
            Err(err) if attempt < MAX_ATTEMPTS => {
                let backoff = (BASE_BACKOFF * 2u32.pow(attempt - 1)).min(MAX_BACKOFF);
                let jitter = backoff.mul_f64(1.0 + (fastrand_jitter() - 0.5) * 0.5);
                warn!(op = op_name, attempt, error = %err, "retrying after transient S3 error");
                tokio::time::sleep(jitter).await;
            }
            Err(err) => {
                return Err(BlobError::backend(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("{op_name} failed after {attempt} attempts: {err}"),
                )))
            }
        }
    }
}

/// Small deterministic-enough jitter source without pulling in `rand`
/// for a single call site; good enough since retries are already rare.
fn fastrand_jitter() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.subsec_nanos()).unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
}

impl S3CompatibleStore {
    pub async fn from_config(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "res-blob-static",
        );

        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint.clone())
            .credentials_provider(credentials)
            .load()
            .await;

        let client = Client::new(&shared_config);

        Self { client, bucket: config.bucket_name.clone() }
    }

    async fn buffer(stream: ByteStream) -> BlobResult<Bytes> {
        let mut stream = stream;
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(BlobError::backend)?;
            buf.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buf))
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    #[instrument(skip(self, stream), fields(key = %key))]
    async fn put(&self, key: &str, content_type: Option<&str>, stream: ByteStream) -> BlobResult<PutResult> {
        let body = Self::buffer(stream).await?;
        let size_bytes = body.len() as u64;

        let out = with_retry("put_object", || {
            let mut req = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(AwsByteStream::from(body.clone()));
            if let Some(ct) = content_type {
                req = req.content_type(ct);
            }
            req.send()
        })
        .await?;

        Ok(PutResult { etag: out.e_tag().map(|s| s.trim_matches('"').to_string()), size_bytes })
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let out = with_retry("get_object", || {
            self.client.get_object().bucket(&self.bucket).key(key).send()
        })
        .await?;

        let size_bytes = out.content_length().unwrap_or(0).max(0) as u64;
        let content_type = out.content_type().map(|s| s.to_string());

        let body = out.body.map(|r| r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));
        let stream: ByteStream = Box::pin(body);

        Ok(GetResult { stream, size_bytes, content_type })
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let out = with_retry("head_object", || {
            self.client.head_object().bucket(&self.bucket).key(key).send()
        })
        .await?;

        Ok(ObjectHead {
            size_bytes: out.content_length().unwrap_or(0).max(0) as u64,
            content_type: out.content_type().map(|s| s.to_string()),
        })
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &str) -> BlobResult<()> {
        with_retry("delete_object", || self.client.delete_object().bucket(&self.bucket).key(key).send()).await?;
        Ok(())
    }
}

#[async_trait]
impl MultipartBlobStore for S3CompatibleStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn init_multipart(&self, key: &str, content_type: Option<&str>) -> BlobResult<String> {
        let out = with_retry("create_multipart_upload", || {
            let mut req = self.client.create_multipart_upload().bucket(&self.bucket).key(key);
            if let Some(ct) = content_type {
                req = req.content_type(ct);
            }
            req.send()
        })
        .await?;

        out.upload_id()
            .map(|s| s.to_string())
            .ok_or_else(|| BlobError::backend(std::io::Error::new(std::io::ErrorKind::Other, "missing upload_id")))
    }

    #[instrument(skip(self, stream), fields(key = %key, upload_id = %upload_id, part_number))]
    async fn put_part(&self, key: &str, upload_id: &str, part_number: i32, stream: ByteStream) -> BlobResult<PartETag> {
        let body = Self::buffer(stream).await?;

        let out = with_retry("upload_part", || {
            self.client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(AwsByteStream::from(body.clone()))
                .send()
        })
        .await?;

        let etag = out
            .e_tag()
            .map(|s| s.trim_matches('"').to_string())
            .ok_or_else(|| BlobError::backend(std::io::Error::new(std::io::ErrorKind::Other, "missing etag")))?;

        Ok(PartETag { part_number, etag })
    }

    #[instrument(skip(self, parts), fields(key = %key, upload_id = %upload_id, part_count = parts.len()))]
    async fn complete_multipart(&self, key: &str, upload_id: &str, parts: Vec<CompletedPart>) -> BlobResult<PutResult> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .into_iter()
                    .map(|p| AwsCompletedPart::builder().part_number(p.part_number).e_tag(p.etag).build())
                    .collect(),
            ))
            .build();

        let out = with_retry("complete_multipart_upload", || {
            self.client
                .complete_multipart_upload()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .multipart_upload(completed.clone())
                .send()
        })
        .await?;

        let head = self.head(key).await?;

        Ok(PutResult { etag: out.e_tag().map(|s| s.trim_matches('"').to_string()), size_bytes: head.size_bytes })
    }

    #[instrument(skip(self), fields(key = %key, upload_id = %upload_id))]
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> BlobResult<()> {
        with_retry("abort_multipart_upload", || {
            self.client.abort_multipart_upload().bucket(&self.bucket).key(key).upload_id(upload_id).send()
        })
        .await?;
        Ok(())
    }
}

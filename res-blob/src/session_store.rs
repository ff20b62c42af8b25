//! Redis-backed cache for [`UploadSession`]s.
//!
//! Session state only needs to survive as long as an upload is in
//! flight; losing it is recoverable (the client re-uploads), so it
//! lives in the cache rather than the durable store, keyed
//! `upload:<uploadId>` with a 24h TTL.

use crate::error::BlobError;
use crate::session::UploadSession;
use crate::BlobResult;
use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::instrument;

const SESSION_TTL_SECONDS: u64 = 86_400;

fn cache_key(upload_id: &str) -> String {
    format!("upload:{upload_id}")
}

#[async_trait]
pub trait UploadSessionStore: Send + Sync {
    async fn create(&self, upload_id: &str, session: &UploadSession) -> BlobResult<()>;
    async fn get(&self, upload_id: &str) -> BlobResult<Option<UploadSession>>;
    async fn save(&self, upload_id: &str, session: &UploadSession) -> BlobResult<()>;
    async fn delete(&self, upload_id: &str) -> BlobResult<()>;
}

pub struct RedisUploadSessionStore {
    client: redis::aio::ConnectionManager,
}

impl RedisUploadSessionStore {
    pub async fn connect(redis_url: &str) -> BlobResult<Self> {
        let client = redis::Client::open(redis_url).map_err(BlobError::cache)?;
        let client = client.get_connection_manager().await.map_err(BlobError::cache)?;
        Ok(Self { client })
    }

    async fn put(&self, upload_id: &str, session: &UploadSession) -> BlobResult<()> {
        let payload = serde_json::to_string(session)?;
        let mut conn = self.client.clone();
        conn.set_ex::<_, _, ()>(cache_key(upload_id), payload, SESSION_TTL_SECONDS)
            .await
            .map_err(BlobError::cache)?;
        Ok(())
    }
}

#[async_trait]
impl UploadSessionStore for RedisUploadSessionStore {
    #[instrument(skip(self, session), fields(upload_id = %upload_id))]
    async fn create(&self, upload_id: &str, session: &UploadSession) -> BlobResult<()> {
        self.put(upload_id, session).await
    }

    #[instrument(skip(self), fields(upload_id = %upload_id))]
    async fn get(&self, upload_id: &str) -> BlobResult<Option<UploadSession>> {
        let mut conn = self.client.clone();
        let raw: Option<String> = conn.get(cache_key(upload_id)).await.map_err(BlobError::cache)?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, session), fields(upload_id = %upload_id))]
    async fn save(&self, upload_id: &str, session: &UploadSession) -> BlobResult<()> {
        self.put(upload_id, session).await
    }

    #[instrument(skip(self), fields(upload_id = %upload_id))]
    async fn delete(&self, upload_id: &str) -> BlobResult<()> {
        let mut conn = self.client.clone();
        conn.del::<_, ()>(cache_key(upload_id)).await.map_err(BlobError::cache)?;
        Ok(())
    }
}

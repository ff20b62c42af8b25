use res_core::AppError;
use thiserror::Error;

/// Result type for blob operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur while assembling or serving blobs.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("invalid request: {message}")]
    Invalid { message: String },

    #[error("upload session not found: {upload_id}")]
    UploadNotFound { upload_id: String },

    #[error("object store error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("session cache error: {source}")]
    Cache {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl BlobError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid { message: message.into() }
    }

    pub fn upload_not_found(upload_id: impl Into<String>) -> Self {
        Self::UploadNotFound { upload_id: upload_id.into() }
    }

    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend { source: Box::new(error) }
    }

    pub fn cache<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Cache { source: Box::new(error) }
    }
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Invalid { message } => AppError::validation(message),
            BlobError::UploadNotFound { upload_id } => {
                AppError::not_found(format!("upload session {upload_id}"))
            }
            BlobError::Backend { source } => AppError::transient(source),
            BlobError::Cache { source } => AppError::transient(source),
            BlobError::Serialization { source } => AppError::internal(source),
        }
    }
}

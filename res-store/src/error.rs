use res_core::AppError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("write conflict: {message}")]
    WriteConflict { message: String },

    #[error("mongodb error: {source}")]
    Mongo {
        #[from]
        source: mongodb::error::Error,
    },
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn write_conflict(message: impl Into<String>) -> Self {
        Self::WriteConflict { message: message.into() }
    }

    /// `true` for Mongo errors the driver or server marks transient (label
    /// `TransientTransactionError`) or a write conflict, i.e. safe to retry
    /// the whole transaction.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::WriteConflict { .. } => true,
            StoreError::Mongo { source } => {
                source.contains_label(mongodb::error::TRANSIENT_TRANSACTION_ERROR)
                    || source.contains_label(mongodb::error::UNKNOWN_TRANSACTION_COMMIT_RESULT)
            }
            StoreError::NotFound { .. } => false,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound { what } => AppError::not_found(what.clone()),
            StoreError::WriteConflict { message } => AppError::conflict(message.clone()),
            StoreError::Mongo { .. } if err.is_transient() => AppError::conflict(err.to_string()),
            StoreError::Mongo { .. } => AppError::internal(anyhow::anyhow!(err.to_string())),
        }
    }
}

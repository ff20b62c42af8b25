//! Structured error taxonomy shared by every crate in the workspace.
//!
//! Each variant answers three questions at the point it's raised:
//! is this the caller's fault, is it worth retrying, and what HTTP
//! status or bus disposition should it map to downstream.

use thiserror::Error;

/// The single error type passed between `res-store`, `res-blob`, `res-bus`
/// and `res-web`. Crate-local error types convert into this at the
/// boundary where they cross into shared code.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("transient error: {source}")]
    Transient {
        #[source]
        source: anyhow::Error,
    },

    #[error("internal error: {source}")]
    Internal {
        #[source]
        source: anyhow::Error,
    },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn transient(source: impl Into<anyhow::Error>) -> Self {
        Self::Transient { source: source.into() }
    }

    pub fn internal(source: impl Into<anyhow::Error>) -> Self {
        Self::Internal { source: source.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// HTTP status code this error should be rendered as at the web boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::Unauthorized => 401,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Transient { .. } => 503,
            AppError::Internal { .. } => 500,
            AppError::Config { .. } => 500,
        }
    }

    /// Whether a bus consumer should retry (nack to the delay path) or
    /// treat this as a terminal, non-retryable failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Conflict { .. } | AppError::Transient { .. })
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

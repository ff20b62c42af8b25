//! Error taxonomy and typed configuration shared across the
//! reservation-ingestion workspace. No I/O lives here.

pub mod config;
pub mod error;

pub use config::{ApiConfig, AppConfig, AuthConfig, LogFormat, MongoConfig, S3Config};
pub use error::{AppError, AppResult};

//! Typed configuration, loaded eagerly from the environment at startup.
//!
//! Every field is required; a missing or malformed value is an
//! [`AppError::Config`] raised before any downstream connection is
//! attempted, matching the "fatal at startup" entry in the error
//! taxonomy. There is no dotted string bag here; the nested keys in
//! the wire contract (`s3.accessKeyId`, `mongodb.dbName`, ...) map to
//! nested structs, each with its own `from_env`.

use crate::error::AppError;
use std::env;

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::config(format!("missing required env var {key}")))
}

fn required_parse<T: std::str::FromStr>(key: &str) -> Result<T, AppError> {
    let raw = required(key)?;
    raw.parse::<T>()
        .map_err(|_| AppError::config(format!("env var {key} is not valid: {raw}")))
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub url: String,
    pub db_name: String,
}

impl MongoConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            url: required("MONGODB_URL")?,
            db_name: required("MONGODB_DB_NAME")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub endpoint: String,
    pub bucket_name: String,
}

impl S3Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            access_key_id: required("S3_ACCESS_KEY_ID")?,
            secret_access_key: required("S3_SECRET_ACCESS_KEY")?,
            region: required("S3_REGION")?,
            endpoint: required("S3_ENDPOINT")?,
            bucket_name: required("S3_BUCKET_NAME")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            host: required("API_HOST")?,
            port: required_parse("API_PORT")?,
            env: required("API_ENV")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub root_api_key: String,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            root_api_key: required("AUTH_ROOT_API_KEY")?,
        })
    }
}

/// Output format for the `tracing` subscriber. Selected by `worker.logger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(AppError::config(format!(
                "worker.logger must be \"json\" or \"pretty\", got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rabbitmq_url: String,
    pub mongodb: MongoConfig,
    pub redis_url: String,
    pub s3: S3Config,
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub worker_logger: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let worker_logger = env::var("WORKER_LOGGER").unwrap_or_else(|_| "json".to_string());

        Ok(Self {
            rabbitmq_url: required("RABBITMQ_URL")?,
            mongodb: MongoConfig::from_env()?,
            redis_url: required("REDIS_URL")?,
            s3: S3Config::from_env()?,
            api: ApiConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            worker_logger: worker_logger.parse()?,
        })
    }
}

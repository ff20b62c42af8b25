use res_core::AppError;
use thiserror::Error;

pub type BusResult<T> = Result<T, BusError>;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("amqp error: {source}")]
    Amqp {
        #[from]
        source: lapin::Error,
    },

    #[error("malformed message: {message}")]
    Malformed { message: String },
}

impl BusError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed { message: message.into() }
    }
}

impl From<BusError> for AppError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Amqp { source } => AppError::transient(source),
            BusError::Malformed { message } => AppError::validation(message),
        }
    }
}

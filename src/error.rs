use thiserror::Error as ThisError;

use crate::services::record_sink::SinkError;
use crate::services::transport::TransportError;

#[derive(ThisError, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] SinkError),

    #[error("No data collected: {0}")]
    NoData(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

// Alias for convenience
pub type Error = AppError;

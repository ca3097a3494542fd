//! Error types for the drover engine

use thiserror::Error;

/// Main error type for the drover engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Dispatch error: {0}")]
    DispatchError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}

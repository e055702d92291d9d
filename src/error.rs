//! Error type for the rendering core

use thiserror::Error;

/// Errors raised while loading or rendering coverage reports
#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CoverageError>;

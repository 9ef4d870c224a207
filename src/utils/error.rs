//! Error types and handling
//!
//! Common error types used across the crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Invalid recording: {0}")]
    InvalidRecording(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Driver error: {0}")]
    Driver(String),
}

/// Error response for a presentation layer
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        let code = match &error {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Fetch(_) => "FETCH_ERROR",
            AppError::InvalidRecording(_) => "INVALID_RECORDING",
            AppError::Detector(_) => "DETECTOR_ERROR",
            AppError::Audio(_) => "AUDIO_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Driver(_) => "DRIVER_ERROR",
        };

        ErrorResponse {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

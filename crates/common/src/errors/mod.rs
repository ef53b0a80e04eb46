//! Error types for the feedback analysis component
//!
//! All fatal conditions terminate the run: configuration problems are
//! reported before processing starts, API failures abort the run with no
//! partial-result salvage, and invariant breaches are surfaced as internal
//! errors.

use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // External service errors
    #[error("Analysis service error: {message}")]
    Api { message: String },

    #[error("Analysis service returned {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Invariant violations
    #[error("Malformed document id token: {token}")]
    CorruptDocumentId { token: String },

    // Internal errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Construct a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        AppError::Configuration {
            message: message.into(),
        }
    }

    /// Construct an analysis service error
    pub fn api(message: impl Into<String>) -> Self {
        AppError::Api {
            message: message.into(),
        }
    }
}
